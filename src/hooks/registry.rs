//! # Hook registry with contained invocation.
//!
//! Holds the single optional `is_ready` / `is_stale` / `priority` predicates
//! and the event sinks. At most one callback may occupy each slot;
//! registering into an occupied slot is a configuration error (callbacks
//! dispatch on `work.task` internally when they need per-task behavior).
//!
//! ## Containment
//! Client code must never break a scheduler iteration, so every invocation
//! goes through [`catch_unwind`]:
//! - `is_ready` panic → treated as **not ready** (work stays pending)
//! - `is_stale` panic → treated as **stale** (work runs; fail-open so work
//!   doesn't silently not run)
//! - `priority` panic or non-finite value → `0.5`
//! - event sink panic → swallowed
//!
//! Every contained panic is logged with the slot name.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::warn;

use crate::error::CueError;
use crate::hooks::PriorityContext;
use crate::work::WorkUnit;

type ReadyFn = dyn Fn(&WorkUnit) -> bool + Send + Sync;
type StaleFn = dyn Fn(&WorkUnit) -> bool + Send + Sync;
type PriorityFn = dyn Fn(&PriorityContext<'_>) -> f64 + Send + Sync;
type StartFn = dyn Fn(&WorkUnit) + Send + Sync;
type CompleteFn = dyn Fn(&WorkUnit, &Value, f64) + Send + Sync;
type FailureFn = dyn Fn(&WorkUnit, &str) + Send + Sync;
type SkipFn = dyn Fn(&WorkUnit) + Send + Sync;
type StallFn = dyn Fn(f64, usize) + Send + Sync;

/// One exclusive registration slot.
struct Slot<T: ?Sized> {
    name: &'static str,
    cb: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cb: RwLock::new(None),
        }
    }

    fn set(&self, cb: Arc<T>) -> Result<(), CueError> {
        let mut slot = self.cb.write().expect("hook slot poisoned");
        if slot.is_some() {
            return Err(CueError::config(format!(
                "{} callback already registered",
                self.name
            )));
        }
        *slot = Some(cb);
        Ok(())
    }

    fn get(&self) -> Option<Arc<T>> {
        self.cb.read().expect("hook slot poisoned").clone()
    }
}

/// The callback registry: three predicates plus five event sinks.
pub(crate) struct Hooks {
    is_ready: Slot<ReadyFn>,
    is_stale: Slot<StaleFn>,
    priority: Slot<PriorityFn>,
    on_start: Slot<StartFn>,
    on_complete: Slot<CompleteFn>,
    on_failure: Slot<FailureFn>,
    on_skip: Slot<SkipFn>,
    on_stall_warning: Slot<StallFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self {
            is_ready: Slot::new("is_ready"),
            is_stale: Slot::new("is_stale"),
            priority: Slot::new("priority"),
            on_start: Slot::new("on_start"),
            on_complete: Slot::new("on_complete"),
            on_failure: Slot::new("on_failure"),
            on_skip: Slot::new("on_skip"),
            on_stall_warning: Slot::new("on_stall_warning"),
        }
    }

    // --- Registration ---

    pub fn set_is_ready(&self, cb: Arc<ReadyFn>) -> Result<(), CueError> {
        self.is_ready.set(cb)
    }

    pub fn set_is_stale(&self, cb: Arc<StaleFn>) -> Result<(), CueError> {
        self.is_stale.set(cb)
    }

    pub fn set_priority(&self, cb: Arc<PriorityFn>) -> Result<(), CueError> {
        self.priority.set(cb)
    }

    pub fn set_on_start(&self, cb: Arc<StartFn>) -> Result<(), CueError> {
        self.on_start.set(cb)
    }

    pub fn set_on_complete(&self, cb: Arc<CompleteFn>) -> Result<(), CueError> {
        self.on_complete.set(cb)
    }

    pub fn set_on_failure(&self, cb: Arc<FailureFn>) -> Result<(), CueError> {
        self.on_failure.set(cb)
    }

    pub fn set_on_skip(&self, cb: Arc<SkipFn>) -> Result<(), CueError> {
        self.on_skip.set(cb)
    }

    pub fn set_on_stall_warning(&self, cb: Arc<StallFn>) -> Result<(), CueError> {
        self.on_stall_warning.set(cb)
    }

    // --- Contained invocation ---

    /// Readiness of a unit's inputs. No callback → implicitly ready.
    pub fn ready(&self, work: &WorkUnit) -> bool {
        let Some(cb) = self.is_ready.get() else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(|| cb(work))) {
            Ok(v) => v,
            Err(p) => {
                let msg = panic_message(&*p);
                warn!(
                    work = %work.id,
                    panic = %msg,
                    "is_ready callback panicked; treating as not ready"
                );
                false
            }
        }
    }

    /// Staleness of a unit's output. No callback → implicitly stale (run).
    pub fn stale(&self, work: &WorkUnit) -> bool {
        let Some(cb) = self.is_stale.get() else {
            return true;
        };
        match catch_unwind(AssertUnwindSafe(|| cb(work))) {
            Ok(v) => v,
            Err(p) => {
                let msg = panic_message(&*p);
                warn!(
                    work = %work.id,
                    panic = %msg,
                    "is_stale callback panicked; treating as stale"
                );
                true
            }
        }
    }

    /// Priority key in `[0, 1]`, or `None` when no callback is registered
    /// (the scheduler then falls back to wait-time ordering).
    pub fn priority(&self, ctx: &PriorityContext<'_>) -> Option<f64> {
        let cb = self.priority.get()?;
        let key = match catch_unwind(AssertUnwindSafe(|| cb(ctx))) {
            Ok(v) if v.is_finite() => v.clamp(0.0, 1.0),
            Ok(_) => 0.5,
            Err(p) => {
                let msg = panic_message(&*p);
                warn!(
                    work = %ctx.work.id,
                    panic = %msg,
                    "priority callback panicked; defaulting to 0.5"
                );
                0.5
            }
        };
        Some(key)
    }

    pub fn start(&self, work: &WorkUnit) {
        if let Some(cb) = self.on_start.get() {
            contain("on_start", || cb(work));
        }
    }

    pub fn complete(&self, work: &WorkUnit, result: &Value, duration_seconds: f64) {
        if let Some(cb) = self.on_complete.get() {
            contain("on_complete", || cb(work, result, duration_seconds));
        }
    }

    pub fn failure(&self, work: &WorkUnit, error: &str) {
        if let Some(cb) = self.on_failure.get() {
            contain("on_failure", || cb(work, error));
        }
    }

    pub fn skip(&self, work: &WorkUnit) {
        if let Some(cb) = self.on_skip.get() {
            contain("on_skip", || cb(work));
        }
    }

    pub fn stall_warning(&self, seconds_since_progress: f64, pending_count: usize) {
        if let Some(cb) = self.on_stall_warning.get() {
            contain("on_stall_warning", || {
                cb(seconds_since_progress, pending_count)
            });
        }
    }
}

/// Runs an event sink, swallowing (and logging) any panic.
fn contain(name: &'static str, f: impl FnOnce()) {
    if let Err(p) = catch_unwind(AssertUnwindSafe(f)) {
        let msg = panic_message(&*p);
        warn!(sink = name, panic = %msg, "event sink panicked");
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(p: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
