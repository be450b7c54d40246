//! # Runtime events emitted by the coordinator.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Work lifecycle**: a unit's journey (submitted, started, completed,
//!   failed, skipped, cancelled, retry scheduled)
//! - **Age policies**: pending-timeout and stall detection
//! - **Coordinator lifecycle**: scheduler start, shutdown, drain outcome
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! work/task identifiers, error messages, and retry delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. This guarantees that events can be ordered correctly even
//! when delivered out-of-order through async channels.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use workcue::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::WorkFailed)
//!     .with_work("w_9f2d")
//!     .with_task("extract")
//!     .with_error("connection refused")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::WorkFailed);
//! assert_eq!(ev.task.as_deref(), Some("extract"));
//! assert_eq!(ev.error.as_deref(), Some("connection refused"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Work lifecycle events ===
    /// A work unit entered the pending queue.
    WorkSubmitted,
    /// A work unit was dispatched; its handler is running.
    WorkStarted,
    /// A handler returned successfully.
    WorkCompleted,
    /// A work unit reached terminal failure.
    WorkFailed,
    /// A work unit was skipped because its output is still valid.
    WorkSkipped,
    /// A work unit was cancelled.
    WorkCancelled,
    /// A failed attempt will be retried after a delay.
    RetryScheduled,

    // === Age policy events ===
    /// A work unit exceeded the configured pending timeout.
    PendingExpired,
    /// No terminal transition for longer than the stall warn threshold.
    StallWarning,
    /// The stall timeout elapsed; all pending work was failed.
    StallExpired,

    // === Coordinator lifecycle events ===
    /// The scheduler loop started.
    SchedulerStarted,
    /// Graceful shutdown was requested.
    ShutdownRequested,
    /// The shutdown grace period elapsed with handlers still running.
    DrainTimedOut,

    // === Subscriber events ===
    // Published by the fan-out itself; visible to raw bus receivers but
    // never delivered back to subscribers.
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// Carries information about work lifecycle, retries, errors, delays, and timing.
///
/// ## Fields
///
/// - `seq`: Unique sequence number for ordering (monotonically increasing)
/// - `at`: Wall-clock timestamp (may go backwards due to NTP, use for logging only)
/// - `kind`: Event classification
/// - `work_id`, `task`, `error`, `attempt`, `duration`, `delay`, `pending`:
///   Optional metadata
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    /// Used to determine event ordering across async boundaries.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Work unit id, if applicable.
    pub work_id: Option<String>,
    /// Task type name, if applicable.
    pub task: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Handler duration (completion events).
    pub duration: Option<Duration>,
    /// Retry delay before the next attempt (if relevant).
    pub delay: Option<Duration>,
    /// Pending queue depth (stall events).
    pub pending: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            work_id: None,
            task: None,
            error: None,
            attempt: None,
            duration: None,
            delay: None,
            pending: None,
        }
    }

    /// Attaches a work unit id.
    pub fn with_work(mut self, id: impl Into<String>) -> Self {
        self.work_id = Some(id.into());
        self
    }

    /// Attaches a task type name.
    pub fn with_task(mut self, name: impl Into<String>) -> Self {
        self.task = Some(name.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches an attempt count.
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a handler duration.
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }

    /// Attaches a retry delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches a pending queue depth.
    pub fn with_pending(mut self, n: usize) -> Self {
        self.pending = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    ///
    /// Published by the fan-out when a subscriber's queue dropped an event.
    /// The subscriber's name rides in the `task` field, the drop reason in
    /// `error`.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_error(reason)
    }

    /// Creates a subscriber panic event.
    ///
    /// Published by the fan-out when a subscriber panics during event
    /// processing. The subscriber's name rides in the `task` field, the
    /// panic payload in `error`.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_error(info)
    }
}
