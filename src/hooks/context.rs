//! Context handed to the priority callback.

use crate::work::WorkUnit;

/// Snapshot of the queue position a priority callback ranks.
#[derive(Debug)]
pub struct PriorityContext<'a> {
    /// The work unit being ranked.
    pub work: &'a WorkUnit,
    /// Seconds since the unit was submitted.
    pub wait_time: f64,
    /// Total pending work count at evaluation time.
    pub queue_depth: usize,
}
