//! Event-level stage interface.

use j4p_core::Event;

use crate::cutflow::Cutflow;

/// A stateless per-event stage that may narrow the event in place and decides
/// whether it survives. Every decision is counted on `cutflow` under the cut
/// ids the stage declared when it was built.
pub trait EventFilter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns `false` when the event is dropped.
    fn apply(&self, event: &mut Event, cutflow: &mut Cutflow) -> bool;
}
