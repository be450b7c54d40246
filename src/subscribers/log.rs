//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] emits events through `tracing` in a human-readable format.
//! This is primarily useful for development, debugging, and the demos.
//!
//! ## Output format
//! ```text
//! [submitted] work=w_9f2d task=extract
//! [started] work=w_9f2d task=extract attempt=1
//! [failed] work=w_9f2d err="connection refused" attempt=1
//! [retry] work=w_9f2d delay=2s after_attempt=1
//! [skipped] work=w_41aa task=extract
//! [stall-warning] pending=4
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Simple `tracing`-backed logging subscriber.
///
/// Enabled via the `logging` feature. Emits human-readable event
/// descriptions for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let work = e.work_id.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkSubmitted => {
                info!(work, task = ?e.task, "[submitted]");
            }
            EventKind::WorkStarted => {
                info!(work, task = ?e.task, attempt = ?e.attempt, "[started]");
            }
            EventKind::WorkCompleted => {
                info!(work, duration = ?e.duration, "[completed]");
            }
            EventKind::WorkFailed => {
                warn!(work, err = ?e.error, attempt = ?e.attempt, "[failed]");
            }
            EventKind::WorkSkipped => {
                info!(work, task = ?e.task, "[skipped]");
            }
            EventKind::WorkCancelled => {
                info!(work, "[cancelled]");
            }
            EventKind::RetryScheduled => {
                info!(work, delay = ?e.delay, after_attempt = ?e.attempt, "[retry]");
            }
            EventKind::PendingExpired => {
                warn!(work, err = ?e.error, "[pending-expired]");
            }
            EventKind::StallWarning => {
                warn!(pending = ?e.pending, "[stall-warning]");
            }
            EventKind::StallExpired => {
                warn!(pending = ?e.pending, "[stall-expired]");
            }
            EventKind::SchedulerStarted => {
                info!("[scheduler-started]");
            }
            EventKind::ShutdownRequested => {
                info!("[shutdown-requested]");
            }
            EventKind::DrainTimedOut => {
                warn!("[drain-timed-out]");
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
