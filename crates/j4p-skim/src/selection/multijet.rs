//! Multijet balance: leading jet against the recoil system.

use j4p_core::{Dataset, Event, LorentzVector, Probe, Tag, TagProbe};

use super::{Selection, jet_activity};
use crate::cutflow::{CutId, CutRegistry, Cutflow};

const ETA_MAX: f64 = 2.5;
const PT_MIN: f64 = 30.0;

pub struct MultijetSelection {
    three_jets: CutId,
    leading: CutId,
    recoil: CutId,
}

impl MultijetSelection {
    pub fn new(registry: &mut CutRegistry) -> Self {
        Self {
            three_jets: registry.declare("nJet > 2"),
            leading: registry.declare("Leading jet pT > 30 and |eta| < 2.5"),
            recoil: registry.declare("At least one recoil jet"),
        }
    }
}

impl Selection for MultijetSelection {
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe> {
        let jets = &event.jets;
        if !cutflow.check(self.three_jets, jets.len() > 2) {
            return None;
        }

        let accepted = |i: usize| jets.eta[i].abs() < ETA_MAX && jets.pt[i] > PT_MIN;
        if !cutflow.check(self.leading, accepted(0)) {
            return None;
        }

        let recoil: Vec<usize> = (1..jets.len()).filter(|&i| accepted(i)).collect();
        if !cutflow.check(self.recoil, !recoil.is_empty()) {
            return None;
        }

        let tag_p4 = jets.p4(0);
        let probe_p4: LorentzVector = recoil.iter().map(|&i| jets.p4(i)).sum();
        let tag = Tag {
            pt: jets.pt[0],
            eta: jets.eta[0],
            phi: jets.phi[0],
            mass: jets.mass[0],
            label: Dataset::Multijet.label(),
        };
        let probe = Probe::composite(&probe_p4);
        let activity = jet_activity(jets, tag_p4 + probe_p4);
        Some(TagProbe { tag, probe, activity })
    }
}
