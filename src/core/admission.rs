//! # Admission evaluator.
//!
//! Pure decision function applied by the scheduler to each pending
//! candidate. The check order is observable and deliberate:
//!
//! 1. task resolution (unknown tasks stay pending, surfaced by
//!    [`debug_blocked`](crate::Cue::debug_blocked))
//! 2. retry-backoff hold
//! 3. `is_ready` (input validity)
//! 4. `is_stale` (output validity; a fresh output means **skip**)
//! 5. service capacity (concurrency + rate window)
//!
//! `is_stale` is never consulted before `is_ready` passes, and neither runs
//! for items the walk already rejected, because client predicates may
//! perform I/O whose cost the client controls.

use std::fmt;
use std::time::Instant;

use crate::hooks::{Hooks, PriorityContext};
use crate::services::{AdmitState, ServiceTable};
use crate::tasks::TaskSpec;
use crate::work::WorkUnit;

/// Outcome of evaluating one pending work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The unit's task is not registered; it stays pending.
    UnknownTask,
    /// A retry backoff hold is still in effect.
    RetryHold,
    /// `is_ready` answered false (or panicked).
    NotReady,
    /// `is_stale` answered false: the output is still valid, skip the unit.
    Skip,
    /// The service would not admit a dispatch right now.
    ServiceBusy(AdmitState),
    /// All gates passed; the unit may be dispatched.
    Dispatch,
}

/// Evaluates the admission gates for `work`.
///
/// Pure with respect to coordinator state: the only side effects are the
/// client predicate invocations (and lazy window eviction inside the
/// service table).
pub(crate) fn evaluate(
    work: &WorkUnit,
    task: Option<&TaskSpec>,
    services: &ServiceTable,
    hooks: &Hooks,
    now: Instant,
) -> Verdict {
    let Some(task) = task else {
        return Verdict::UnknownTask;
    };

    if let Some(eligible) = work.next_eligible {
        if now < eligible {
            return Verdict::RetryHold;
        }
    }

    if !hooks.ready(work) {
        return Verdict::NotReady;
    }

    if !hooks.stale(work) {
        return Verdict::Skip;
    }

    match services.admit_state(task.service(), now) {
        AdmitState::Admissible => Verdict::Dispatch,
        state => Verdict::ServiceBusy(state),
    }
}

/// Why a pending unit is currently blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedReason {
    /// `is_ready` answered false, or a retry backoff hold is in effect.
    NotReady,
    /// The service's concurrency or rate budget is exhausted.
    ServiceFull,
    /// The unit's task is not registered.
    UnknownTask,
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockedReason::NotReady => "not_ready",
            BlockedReason::ServiceFull => "service_full",
            BlockedReason::UnknownTask => "unknown_task",
        };
        f.write_str(name)
    }
}

/// One entry of [`debug_blocked`](crate::Cue::debug_blocked).
#[derive(Debug, Clone)]
pub struct Blocked {
    /// Snapshot of the blocked unit.
    pub work: WorkUnit,
    /// Classification of the block.
    pub reason: BlockedReason,
    /// Human-readable detail.
    pub details: String,
}

/// Maps a verdict to a diagnostic entry; dispatchable and skip-eligible
/// units are not blocked.
pub(crate) fn classify_blocked(
    verdict: Verdict,
    work: &WorkUnit,
    service: Option<&str>,
    now: Instant,
) -> Option<(BlockedReason, String)> {
    let service = service.unwrap_or("?");
    match verdict {
        Verdict::UnknownTask => Some((
            BlockedReason::UnknownTask,
            format!("task '{}' is not registered", work.task),
        )),
        Verdict::RetryHold => {
            let remaining = work
                .next_eligible
                .map(|e| e.saturating_duration_since(now))
                .unwrap_or_default();
            Some((
                BlockedReason::NotReady,
                format!("retry backoff for another {:.1}s", remaining.as_secs_f64()),
            ))
        }
        Verdict::NotReady => Some((
            BlockedReason::NotReady,
            "is_ready returned false".to_string(),
        )),
        Verdict::ServiceBusy(state) => {
            let details = match state {
                AdmitState::AtConcurrency => {
                    format!("service '{service}' at concurrency limit")
                }
                AdmitState::RateExhausted => {
                    format!("service '{service}' rate window exhausted")
                }
                _ => format!("service '{service}' not registered"),
            };
            Some((BlockedReason::ServiceFull, details))
        }
        Verdict::Skip | Verdict::Dispatch => None,
    }
}

/// Priority key for one pending unit.
///
/// With a registered callback: its return clamped to `[0,1]` (errors →
/// `0.5`). Without: the wait time in seconds, which makes the descending
/// sort FIFO. Ties always break on `created_at` ascending so an old unit
/// cannot starve behind a stream of equal-priority newcomers.
pub(crate) fn priority_key(hooks: &Hooks, ctx: &PriorityContext<'_>) -> f64 {
    hooks.priority(ctx).unwrap_or(ctx.wait_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceSpec;
    use crate::tasks::{HandlerFn, TaskSpec};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn task() -> TaskSpec {
        TaskSpec::new(
            "extract",
            "api",
            HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
        )
    }

    fn table() -> ServiceTable {
        let t = ServiceTable::new();
        t.register(ServiceSpec::new("api").concurrent(1)).unwrap();
        t
    }

    #[test]
    fn unknown_task_blocks_without_consulting_predicates() {
        let hooks = Hooks::new();
        hooks
            .set_is_ready(Arc::new(|_: &WorkUnit| panic!("must not be called")))
            .unwrap();
        let work = WorkUnit::new("ghost", json!({}));
        let v = evaluate(&work, None, &table(), &hooks, Instant::now());
        assert_eq!(v, Verdict::UnknownTask);
    }

    #[test]
    fn stale_is_not_consulted_until_ready_passes() {
        let hooks = Hooks::new();
        hooks.set_is_ready(Arc::new(|_: &WorkUnit| false)).unwrap();
        hooks
            .set_is_stale(Arc::new(|_: &WorkUnit| panic!("must not be called")))
            .unwrap();
        let work = WorkUnit::new("extract", json!({}));
        let v = evaluate(&work, Some(&task()), &table(), &hooks, Instant::now());
        assert_eq!(v, Verdict::NotReady);
    }

    #[test]
    fn fresh_output_skips_before_service_check() {
        let hooks = Hooks::new();
        hooks.set_is_stale(Arc::new(|_: &WorkUnit| false)).unwrap();
        let services = table();
        // Saturate the service: the skip must still win.
        assert!(services.try_reserve("api", Instant::now()));
        let work = WorkUnit::new("extract", json!({}));
        let v = evaluate(&work, Some(&task()), &services, &hooks, Instant::now());
        assert_eq!(v, Verdict::Skip);
    }

    #[test]
    fn saturated_service_blocks() {
        let hooks = Hooks::new();
        let services = table();
        assert!(services.try_reserve("api", Instant::now()));
        let work = WorkUnit::new("extract", json!({}));
        let v = evaluate(&work, Some(&task()), &services, &hooks, Instant::now());
        assert_eq!(v, Verdict::ServiceBusy(AdmitState::AtConcurrency));
    }

    #[test]
    fn retry_hold_expires() {
        let hooks = Hooks::new();
        let services = table();
        let mut work = WorkUnit::new("extract", json!({}));
        let now = Instant::now();
        work.next_eligible = Some(now + Duration::from_secs(5));
        assert_eq!(
            evaluate(&work, Some(&task()), &services, &hooks, now),
            Verdict::RetryHold
        );
        assert_eq!(
            evaluate(
                &work,
                Some(&task()),
                &services,
                &hooks,
                now + Duration::from_secs(6)
            ),
            Verdict::Dispatch
        );
    }

    #[test]
    fn all_gates_open_means_dispatch() {
        let hooks = Hooks::new();
        let work = WorkUnit::new("extract", json!({}));
        let v = evaluate(&work, Some(&task()), &table(), &hooks, Instant::now());
        assert_eq!(v, Verdict::Dispatch);
    }
}
