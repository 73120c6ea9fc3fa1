//! Trigger (logical OR) and data-quality flag (logical AND) requirements.
//!
//! The record source fills `Event::triggers` in the order triggers were
//! requested and `Event::flags` in [`MANDATORY_FLAGS`] order, so both filters
//! only look at bit vectors.

use j4p_core::Event;

use crate::cutflow::{CutId, CutRegistry, Cutflow};
use crate::stage::EventFilter;

/// Event-quality flags every event must pass.
pub const MANDATORY_FLAGS: [&str; 8] = [
    "Flag_goodVertices",
    "Flag_globalSuperTightHalo2016Filter",
    "Flag_EcalDeadCellTriggerPrimitiveFilter",
    "Flag_BadPFMuonFilter",
    "Flag_BadPFMuonDzFilter",
    "Flag_hfNoisyHitsFilter",
    "Flag_eeBadScFilter",
    "Flag_ecalBadCalibFilter",
];

/// Stage name used when no trigger was requested.
pub const NO_TRIGGER_CUT: &str = "No trigger requirement";

/// Stage name for a trigger request: the names joined by `" || "`.
pub fn trigger_cut_name(triggers: &[String]) -> String {
    if triggers.is_empty() { NO_TRIGGER_CUT.to_string() } else { triggers.join(" || ") }
}

/// Stage name for the flag requirement: the names joined by `" && "`.
pub fn flag_cut_name() -> String {
    MANDATORY_FLAGS.join(" && ")
}

/// Passes when no trigger was requested or at least one requested trigger fired.
pub struct TriggerFilter {
    name: String,
    accept_all: bool,
    cut: CutId,
}

impl TriggerFilter {
    pub fn new(triggers: &[String], registry: &mut CutRegistry) -> Self {
        let name = trigger_cut_name(triggers);
        let cut = registry.declare(name.clone());
        Self { name, accept_all: triggers.is_empty(), cut }
    }
}

impl EventFilter for TriggerFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event, cutflow: &mut Cutflow) -> bool {
        let fired = self.accept_all || event.triggers.iter().any(|&t| t);
        cutflow.check(self.cut, fired)
    }
}

/// Passes when every mandatory flag is set.
pub struct FlagFilter {
    name: String,
    cut: CutId,
}

impl FlagFilter {
    pub fn new(registry: &mut CutRegistry) -> Self {
        let name = flag_cut_name();
        let cut = registry.declare(name.clone());
        Self { name, cut }
    }
}

impl EventFilter for FlagFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, event: &mut Event, cutflow: &mut Cutflow) -> bool {
        let ok = event.flags.len() == MANDATORY_FLAGS.len() && event.flags.iter().all(|&f| f);
        cutflow.check(self.cut, ok)
    }
}
