//! # Work unit: the authoritative record for a submitted item.
//!
//! A [`WorkUnit`] is created by `submit` in [`WorkState::Pending`] and walks
//! a one-way trajectory:
//!
//! ```text
//! PENDING ──► RUNNING ──► COMPLETED
//!    │            ├─────► FAILED
//!    │            └─────► CANCELLED
//!    ├──────────────────► COMPLETED   (skip: output still valid)
//!    ├──────────────────► CANCELLED
//!    └──────────────────► FAILED      (pending/stall timeout)
//! ```
//!
//! Terminal states are immutable; a record never re-enters pending except
//! through the retry path, which is a `RUNNING → PENDING` requeue performed
//! before any terminal transition.
//!
//! Handlers and predicates receive cloned snapshots; the coordinator alone
//! owns the stored record.

use std::fmt;
use std::time::{Instant, SystemTime};

use serde_json::Value;
use uuid::Uuid;

/// Possible states for a work unit.
///
/// `Display` renders the diagnostic names (`PENDING`, `RUNNING`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkState {
    /// Waiting for admission (readiness, staleness, service capacity).
    Pending,
    /// Handler is executing.
    Running,
    /// Handler returned successfully, or the unit was skipped.
    Completed,
    /// Handler failed terminally, or an age policy expired the unit.
    Failed,
    /// The unit was cancelled.
    Cancelled,
}

impl WorkState {
    /// True for `Completed`, `Failed`, and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkState::Completed | WorkState::Failed | WorkState::Cancelled
        )
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkState::Pending => "PENDING",
            WorkState::Running => "RUNNING",
            WorkState::Completed => "COMPLETED",
            WorkState::Failed => "FAILED",
            WorkState::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// A request to perform work.
///
/// The coordinator owns the stored record; handlers, predicates, and event
/// sinks see snapshots taken at well-defined points.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    /// Opaque unique identifier assigned at submit.
    pub id: String,
    /// Task type name (keys into the task registry).
    pub task: String,
    /// Caller-supplied parameter bag, passed verbatim to the handler and
    /// to all predicates. Opaque to the coordinator.
    pub params: Value,
    /// Current lifecycle state.
    pub state: WorkState,
    /// Wall time of submit.
    pub created_at: SystemTime,
    /// Wall time the handler began; unset while pending or skipped.
    pub started_at: Option<SystemTime>,
    /// Wall time of the terminal transition.
    pub completed_at: Option<SystemTime>,
    /// Handler return value on success. Opaque to the coordinator.
    pub result: Option<Value>,
    /// Error description on failure (also set on attempts that will retry).
    pub error: Option<String>,
    /// Number of handler invocations so far (1-based once dispatched).
    pub attempt: u32,

    /// Earliest instant the next attempt may be dispatched (retry backoff).
    pub(crate) next_eligible: Option<Instant>,
    /// Cancellation was requested while the handler was running.
    pub(crate) cancel_requested: bool,
}

impl WorkUnit {
    /// Creates a fresh pending unit with a random id.
    pub(crate) fn new(task: impl Into<String>, params: Value) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            task: task.into(),
            params,
            state: WorkState::Pending,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            attempt: 0,
            next_eligible: None,
            cancel_requested: false,
        }
    }

    /// Seconds the unit has spent waiting since submit, as of `now`.
    pub fn wait_time(&self, now: SystemTime) -> f64 {
        now.duration_since(self.created_at)
            .unwrap_or_default()
            .as_secs_f64()
    }
}
