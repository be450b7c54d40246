//! # Handler runner.
//!
//! Executes one attempt of a dispatched work unit in its own tokio task and
//! reports the outcome to the scheduler mailbox.
//!
//! - **Execute ONE attempt** of the handler with the unit snapshot
//! - **Apply timeout** if the task configured one
//! - **Catch panics** so one handler never taints another or the loop
//! - **Report** a single [`Completion`] message; the scheduler applies the
//!   release/transition/event sequence atomically
//!
//! ## Outcome flow
//!
//! ```text
//! Success:  handler → Ok(value)        → Completion(Ok)
//! Failure:  handler → Err(Fail/Fatal)  → Completion(Err)
//! Timeout:  attempt exceeds limit      → Completion(Err(Fail "timed out"))
//! Panic:    caught via catch_unwind    → Completion(Err(Fail "panicked"))
//! ```
//!
//! The scheduler may have recorded a cancellation intent while the handler
//! ran; that decision is applied on the receiving side, not here.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;

use crate::error::HandlerError;
use crate::hooks::panic_message;
use crate::tasks::TaskSpec;
use crate::work::WorkUnit;

/// Outcome of one handler attempt, reported back to the scheduler.
pub(crate) struct Completion {
    /// Work unit id.
    pub id: String,
    /// Task type name (for attempt-policy lookup).
    pub task: String,
    /// Service whose slot must be released.
    pub service: String,
    /// Handler result or failure.
    pub outcome: Result<Value, HandlerError>,
    /// Measured attempt duration.
    pub duration: Duration,
}

/// Spawns one handler attempt for an already-dispatched unit.
///
/// The caller has reserved the service slot and moved the unit to
/// `RUNNING`; this function only runs the handler and reports.
pub(crate) fn spawn(work: WorkUnit, task: Arc<TaskSpec>, tx: mpsc::UnboundedSender<Completion>) {
    tokio::spawn(async move {
        let id = work.id.clone();
        let started = Instant::now();

        let attempt = AssertUnwindSafe(task.handler().call(work)).catch_unwind();
        let raw = match task.attempt_timeout() {
            Some(limit) => match time::timeout(limit, attempt).await {
                Ok(r) => r,
                Err(_elapsed) => Ok(Err(HandlerError::fail(format!(
                    "attempt timed out after {:.1}s",
                    limit.as_secs_f64()
                )))),
            },
            None => attempt.await,
        };

        let outcome = match raw {
            Ok(res) => res,
            Err(p) => Err(HandlerError::fail(format!(
                "handler panicked: {}",
                panic_message(&*p)
            ))),
        };

        // The receiver is gone only when the scheduler already exited; the
        // completion is then dropped together with the unit's final state.
        let _ = tx.send(Completion {
            id,
            task: task.name().to_string(),
            service: task.service().to_string(),
            outcome,
            duration: started.elapsed(),
        });
    });
}
