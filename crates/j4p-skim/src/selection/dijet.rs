//! Dijet balance: two leading jets, one of them in the barrel.

use j4p_core::{Dataset, Event, Probe, Tag, TagProbe};

use super::{Selection, jet_activity};
use crate::cutflow::{CutId, CutRegistry, Cutflow};

/// |eta| boundary of the barrel region the tag must sit in.
pub const BARREL_ETA: f64 = 1.3;
/// Upper bound on `pt2 / <pt0, pt1>` when a third jet is present.
pub const ALPHA_MAX: f64 = 1.0;
/// Open window on the leading-jet pT ratio.
pub const PT_RATIO_WINDOW: (f64, f64) = (0.7, 1.3);

pub struct DijetSelection {
    two_jets: CutId,
    barrel: CutId,
    alpha: CutId,
    balance: CutId,
}

impl DijetSelection {
    pub fn new(registry: &mut CutRegistry) -> Self {
        Self {
            two_jets: registry.declare("nJet > 1"),
            barrel: registry.declare("One jet in barrel"),
            alpha: registry.declare("alpha < 1.0"),
            balance: registry.declare("1.3 > pT1/pT2 > 0.7"),
        }
    }
}

impl Selection for DijetSelection {
    fn select(&self, event: &Event, cutflow: &mut Cutflow) -> Option<TagProbe> {
        let jets = &event.jets;
        if !cutflow.check(self.two_jets, jets.len() > 1) {
            return None;
        }

        let in_barrel = |i: usize| jets.eta[i].abs() < BARREL_ETA;
        if !cutflow.check(self.barrel, in_barrel(0) || in_barrel(1)) {
            return None;
        }
        // Leading jet wins whenever both are central.
        let tag_idx = if in_barrel(0) { 0 } else { 1 };
        let probe_idx = 1 - tag_idx;

        let alpha_ok = jets.len() < 3 || jets.pt[2] / ((jets.pt[0] + jets.pt[1]) * 0.5) < ALPHA_MAX;
        if !cutflow.check(self.alpha, alpha_ok) {
            return None;
        }

        let ratio = jets.pt[0] / jets.pt[1];
        let (lo, hi) = PT_RATIO_WINDOW;
        if !cutflow.check(self.balance, ratio > lo && ratio < hi) {
            return None;
        }

        let tag = Tag {
            pt: jets.pt[tag_idx],
            eta: jets.eta[tag_idx],
            phi: jets.phi[tag_idx],
            mass: jets.mass[tag_idx],
            label: Dataset::Dijet.label(),
        };
        let probe = Probe::from_jet(jets, probe_idx);
        let activity = jet_activity(jets, jets.p4(tag_idx) + jets.p4(probe_idx));
        Some(TagProbe { tag, probe, activity })
    }
}
