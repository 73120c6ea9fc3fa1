//! Z(→μμ) + jet balance.

use j4p_core::{Dataset, Event, LorentzVector, Muons, Probe, Tag, TagProbe};

use super::{Selection, first_back_to_back_jet, jet_activity};
use crate::cutflow::{CutId, CutRegistry, Cutflow};

const MUON_ETA_MAX: f64 = 2.4;
const MUON_PT_MIN: f64 = 20.0;
const MUON_ISO_MAX: f64 = 0.15;

/// Muons entering the Z candidate.
fn is_good_muon(muons: &Muons, i: usize) -> bool {
    muons.eta[i].abs() < MUON_ETA_MAX
        && muons.pt[i] > MUON_PT_MIN
        && muons.pf_rel_iso04_all[i] < MUON_ISO_MAX
        && muons.tight_id[i]
}

pub struct ZjetSelection {
    two_muons: CutId,
    exactly_two: CutId,
    opposite_charge: CutId,
    probe_jet: CutId,
}

impl ZjetSelection {
    pub fn new(registry: &mut CutRegistry) -> Self {
        Self {
            two_muons: registry.declare("nMuon > 1"),
            exactly_two: registry.declare("Exactly 2 muons"),
            opposite_charge: registry.declare("Opposite charge muons"),
            probe_jet: registry.declare("At least one probe jet"),
        }
    }
}

impl Selection for ZjetSelection {
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe> {
        let muons = &event.muons;
        if !cutflow.check(self.two_muons, muons.len() > 1) {
            return None;
        }

        let good: Vec<usize> = (0..muons.len()).filter(|&i| is_good_muon(muons, i)).collect();
        let [a, b] = cutflow.check_some(self.exactly_two, <[usize; 2]>::try_from(good).ok())?;

        if !cutflow.check(self.opposite_charge, muons.charge[a] + muons.charge[b] == 0) {
            return None;
        }

        let z: LorentzVector = muons.p4(a) + muons.p4(b);
        let tag = Tag::from_p4(&z, Dataset::Zjet.label());

        let jets = &event.jets;
        let probe_idx = cutflow.check_some(self.probe_jet, first_back_to_back_jet(jets, tag.phi))?;

        let probe = Probe::from_jet(jets, probe_idx);
        let activity = jet_activity(jets, jets.p4(probe_idx));
        Some(TagProbe { tag, probe, activity })
    }
}
