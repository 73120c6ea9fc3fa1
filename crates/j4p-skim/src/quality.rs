//! Jet identification filter.

use j4p_core::{Event, Jets};

use crate::cutflow::{CutId, CutRegistry, Cutflow};
use crate::stage::EventFilter;

/// `Jet_jetId` value of the tight working point (tight + lepton veto bits).
pub const TIGHT_JET_ID: i32 = 6;

/// Cutflow stage name of the post-filter multiplicity requirement.
pub const NJET_CUT: &str = "nJet > 0";

/// Keep only jets whose quality flag equals `tight_id`, in every per-jet column.
pub fn retain_tight_jets(jets: &mut Jets, tight_id: i32) {
    let keep: Vec<bool> = jets.jet_id.iter().map(|&id| id == tight_id).collect();
    if keep.iter().all(|&k| k) {
        return;
    }
    retain_mask(&mut jets.pt, &keep);
    retain_mask(&mut jets.eta, &keep);
    retain_mask(&mut jets.phi, &keep);
    retain_mask(&mut jets.mass, &keep);
    retain_mask(&mut jets.area, &keep);
    retain_mask(&mut jets.n_constituents, &keep);
    retain_mask(&mut jets.n_electrons, &keep);
    retain_mask(&mut jets.n_muons, &keep);
    retain_mask(&mut jets.ch_em_ef, &keep);
    retain_mask(&mut jets.ne_em_ef, &keep);
    retain_mask(&mut jets.ch_hef, &keep);
    retain_mask(&mut jets.ne_hef, &keep);
    retain_mask(&mut jets.raw_factor, &keep);
    // the flag column last, filtered by itself
    retain_mask(&mut jets.jet_id, &keep);
}

fn retain_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut mask = keep.iter();
    values.retain(|_| mask.next().copied().unwrap_or(false));
}

/// Drops non-tight jets, then events left without jets.
pub struct JetQualityFilter {
    tight_id: i32,
    cut: CutId,
}

impl JetQualityFilter {
    pub fn new(tight_id: i32, registry: &mut CutRegistry) -> Self {
        Self { tight_id, cut: registry.declare(NJET_CUT) }
    }
}

impl EventFilter for JetQualityFilter {
    fn name(&self) -> &str {
        "jet quality"
    }

    fn apply(&self, event: &mut Event, cutflow: &mut Cutflow) -> bool {
        retain_tight_jets(&mut event.jets, self.tight_id);
        cutflow.check(self.cut, !event.jets.is_empty())
    }
}
