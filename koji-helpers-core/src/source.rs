//! Collaborator seams between the monitor loop and the outside world.
//!
//! A monitor owns exactly one [`ChangeSource`] and one [`ActionPipeline`].
//! Both are blocking; the daemon runtime runs them off the async executor.

use crate::error::ActionError;
use crate::types::{ChangeSnapshot, Watermark};

/// Produces a snapshot of what changed between two bounds.
///
/// Implementations absorb per-subject failures (log, bounded retry, then
/// omit the subject) rather than returning errors: a subject that could not
/// be observed this cycle simply did not change this cycle.
pub trait ChangeSource: Send {
    /// Short human label used in log lines.
    fn describe(&self) -> String;

    /// Restore whatever evidence baseline the source diffs against, as read
    /// from the monitor's state file. Sources that diff purely by time
    /// window ignore this.
    fn restore(&mut self, _baseline: Option<ChangeSnapshot>) {}

    /// Changes observed after `after` and up to `before`.
    fn query(&mut self, after: &Watermark, before: &Watermark) -> ChangeSnapshot;

    /// Called once the batch returned by the latest `query` has been handed
    /// to the pipeline. Returns the baseline to persist, if the source keeps
    /// one.
    fn acknowledge(&mut self) -> Option<ChangeSnapshot> {
        None
    }
}

/// Sign / compose / publish / notify: whatever a settled batch triggers.
pub trait ActionPipeline: Send {
    fn describe(&self) -> String;

    /// Run every stage for the settled `changes`.
    fn execute(&mut self, changes: &ChangeSnapshot) -> Result<(), ActionError>;
}
