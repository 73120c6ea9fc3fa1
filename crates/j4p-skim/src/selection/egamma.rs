//! Photon + jet balance.

use j4p_core::{Dataset, Event, Probe, Tag, TagProbe};

use super::{Selection, first_back_to_back_jet, jet_activity};
use crate::cutflow::{CutId, CutRegistry, Cutflow};

const PHOTON_ETA_MAX: f64 = 1.3;
const PHOTON_PT_MIN: f64 = 15.0;

pub struct EgammaSelection {
    one_photon: CutId,
    good_photon: CutId,
    probe_jet: CutId,
}

impl EgammaSelection {
    pub fn new(registry: &mut CutRegistry) -> Self {
        Self {
            one_photon: registry.declare("nPhoton == 1"),
            good_photon: registry.declare("At least one photon"),
            probe_jet: registry.declare("At least one probe jet"),
        }
    }
}

impl Selection for EgammaSelection {
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe> {
        let photons = &event.photons;
        if !cutflow.check(self.one_photon, photons.len() == 1) {
            return None;
        }

        let selected = (0..photons.len())
            .find(|&i| photons.eta[i].abs() < PHOTON_ETA_MAX && photons.pt[i] > PHOTON_PT_MIN);
        let i = cutflow.check_some(self.good_photon, selected)?;

        let tag = Tag {
            pt: photons.pt[i],
            eta: photons.eta[i],
            phi: photons.phi[i],
            mass: 0.0,
            label: Dataset::Egamma.label(),
        };

        let jets = &event.jets;
        let probe_idx = cutflow.check_some(self.probe_jet, first_back_to_back_jet(jets, tag.phi))?;
        let probe = Probe::from_jet(jets, probe_idx);
        let activity = jet_activity(jets, jets.p4(probe_idx));
        Some(TagProbe { tag, probe, activity })
    }
}
