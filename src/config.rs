//! # Global coordinator configuration.
//!
//! Provides [`CueConfig`] centralized settings for the scheduling runtime.
//!
//! ## Sentinel values
//! - `pending_warn_after` / `pending_timeout` = `None` → per-item age policy disabled
//! - `stall_warn_after` / `stall_timeout` = `None` → whole-coordinator stall policy disabled

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the coordinator runtime.
///
/// Defines:
/// - **Scheduler pacing**: tick interval for periodic re-checks
/// - **Shutdown behavior**: grace period for draining active handlers
/// - **Event system**: bus capacity for event delivery
/// - **Age policies**: pending-timeout and stall-timeout thresholds
/// - **Retry pacing**: backoff policy applied between attempts
///
/// ## Field semantics
/// - `tick`: upper bound on how long the scheduler sleeps between passes;
///   readiness that changed externally (no submit/completion happened) is
///   noticed within one tick
/// - `grace`: maximum wait for active handlers on [`stop`](crate::Cue::stop)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `pending_warn_after` / `pending_timeout`: per-item age thresholds,
///   measured from submit
/// - `stall_warn_after` / `stall_timeout`: whole-coordinator thresholds,
///   measured from the last terminal transition
#[derive(Clone, Debug)]
pub struct CueConfig {
    /// Scheduler tick interval.
    ///
    /// The loop also wakes immediately on submit, cancel, and completion;
    /// the tick only bounds how long externally-caused readiness changes
    /// can go unnoticed.
    pub tick: Duration,

    /// Maximum time [`stop`](crate::Cue::stop) waits for active handlers.
    ///
    /// Handlers are never interrupted; when the grace period elapses the
    /// coordinator logs a warning and returns with handlers still running.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will skip older items. Minimum value is 1 (enforced by the bus).
    pub bus_capacity: usize,

    /// Warn once per item when it has been pending longer than this.
    pub pending_warn_after: Option<Duration>,

    /// Fail an item that has been pending longer than this.
    pub pending_timeout: Option<Duration>,

    /// Warn once per threshold crossing when pending work exists but no
    /// terminal transition happened for this long.
    pub stall_warn_after: Option<Duration>,

    /// Fail all pending items when no terminal transition happened for
    /// this long while pending work exists.
    pub stall_timeout: Option<Duration>,

    /// Delay policy applied between attempts of a failed work unit.
    pub retry_backoff: BackoffPolicy,
}

impl CueConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for CueConfig {
    /// Default configuration:
    ///
    /// - `tick = 50ms`
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - all age policies disabled
    /// - `retry_backoff = BackoffPolicy::default()` (1s doubling, capped at 30s)
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            pending_warn_after: None,
            pending_timeout: None,
            stall_warn_after: None,
            stall_timeout: None,
            retry_backoff: BackoffPolicy::default(),
        }
    }
}
