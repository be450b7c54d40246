//! # Cue: the coordinator's public surface.
//!
//! A [`Cue`] owns the service table, the task registry, the work store, the
//! hook registry, and the event bus, and drives them with one background
//! scheduler task per `start`/`stop` cycle.
//!
//! - Register services and tasks, then the optional predicates and sinks
//! - `submit` work at any time (before or after `start`)
//! - `start` is idempotent and nonblocking; `stop` drains gracefully
//! - `debug_blocked` explains why pending work is not dispatching
//!
//! ## Example
//! ```no_run
//! use serde_json::json;
//! use workcue::{Cue, CueConfig, HandlerFn, ServiceSpec, TaskSpec, WorkUnit};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cue = Cue::new(CueConfig::default());
//!     cue.register_service(ServiceSpec::new("openai").concurrent(5).rate_str("60/min")?)?;
//!     cue.register_task(TaskSpec::new(
//!         "extract",
//!         "openai",
//!         HandlerFn::arc(|work: WorkUnit| async move {
//!             Ok(json!({ "text": format!("extracted {}", work.params["input"]) }))
//!         }),
//!     ))?;
//!     cue.is_ready(|work| work.params.get("input").is_some())?;
//!
//!     cue.start();
//!     let id = cue.submit("extract", json!({ "input": "doc.pdf" })).await?;
//!     cue.stop().await;
//!
//!     println!("{:?}", cue.get(&id).await.map(|w| w.state));
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::CueConfig;
use crate::core::admission::{self, Blocked};
use crate::core::scheduler::Scheduler;
use crate::error::CueError;
use crate::events::{Bus, Event, EventKind};
use crate::hooks::{Hooks, PriorityContext};
use crate::services::{ServiceSpec, ServiceTable};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{TaskRegistry, TaskSpec};
use crate::work::{CancelOutcome, WorkFilter, WorkState, WorkStore, WorkUnit};

/// State shared between the surface and the scheduler task.
pub(crate) struct Shared {
    pub config: CueConfig,
    pub store: WorkStore,
    pub services: ServiceTable,
    pub tasks: TaskRegistry,
    pub hooks: Hooks,
    pub bus: Bus,
    pub wakeup: Notify,
    /// `submit` is allowed. Cleared by `stop`, restored by `start`.
    pub accepting: AtomicBool,
    /// The scheduler should finish in-flight work and exit.
    pub draining: AtomicBool,
    /// Subscribers attached at construction; fanned out per run.
    pub subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Handle to one scheduler run.
struct Runner {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Control tower for coordinating work across rate-limited services.
///
/// The coordinator decides **when** work runs; handlers decide what it
/// does. Fully in-memory: no persistence, no result transport. The
/// application's own artifacts are the truth, consulted through the
/// `is_ready` / `is_stale` predicates.
pub struct Cue {
    shared: Arc<Shared>,
    runner: Mutex<Option<Runner>>,
}

impl Cue {
    /// Creates a coordinator with no subscribers.
    pub fn new(config: CueConfig) -> Self {
        Self::with_subscribers(config, Vec::new())
    }

    /// Creates a coordinator that fans events out to `subscribers` while
    /// running.
    pub fn with_subscribers(config: CueConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(config.bus_capacity_clamped());
        Self {
            shared: Arc::new(Shared {
                config,
                store: WorkStore::new(),
                services: ServiceTable::new(),
                tasks: TaskRegistry::new(),
                hooks: Hooks::new(),
                bus,
                wakeup: Notify::new(),
                accepting: AtomicBool::new(true),
                draining: AtomicBool::new(false),
                subscribers,
            }),
            runner: Mutex::new(None),
        }
    }

    // --- Registration ---

    /// Registers a rate-limited service.
    ///
    /// Re-registering with identical parameters is a no-op; different
    /// parameters fail with [`CueError::Config`].
    pub fn register_service(&self, spec: ServiceSpec) -> Result<(), CueError> {
        self.shared.services.register(spec)
    }

    /// Registers a task type.
    ///
    /// Fails with [`CueError::Config`] if the task's service is unknown or
    /// the name is already taken.
    pub fn register_task(&self, spec: TaskSpec) -> Result<(), CueError> {
        if !self.shared.services.contains(spec.service()) {
            return Err(CueError::config(format!(
                "unknown service '{}' for task '{}'",
                spec.service(),
                spec.name()
            )));
        }
        self.shared.tasks.register(spec)
    }

    // --- Predicates & sinks (each slot holds at most one callback) ---

    /// Registers the readiness predicate: "are this unit's inputs valid?"
    ///
    /// Return `true` to allow dispatch, `false` to keep the unit pending.
    /// A panic inside the predicate counts as not ready.
    pub fn is_ready<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit) -> bool + Send + Sync + 'static,
    {
        self.shared.hooks.set_is_ready(Arc::new(f))
    }

    /// Registers the staleness predicate: "does this unit still need to run?"
    ///
    /// Return `true` to run, `false` to skip (the unit completes without a
    /// handler invocation and `on_skip` fires). A panic counts as stale so
    /// work doesn't silently not run.
    pub fn is_stale<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit) -> bool + Send + Sync + 'static,
    {
        self.shared.hooks.set_is_stale(Arc::new(f))
    }

    /// Registers the priority callback, returning a key in `[0, 1]`
    /// (higher dispatches first). Without one, scheduling is FIFO.
    ///
    /// Expected to return quickly (well under ~100 ms); the scheduler
    /// imposes no hard enforcement but a slow callback delays every pass.
    pub fn priority<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&PriorityContext<'_>) -> f64 + Send + Sync + 'static,
    {
        self.shared.hooks.set_priority(Arc::new(f))
    }

    /// Registers the dispatch sink, fired when a handler begins.
    pub fn on_start<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit) + Send + Sync + 'static,
    {
        self.shared.hooks.set_on_start(Arc::new(f))
    }

    /// Registers the completion sink: `(work, result, duration_seconds)`.
    pub fn on_complete<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit, &Value, f64) + Send + Sync + 'static,
    {
        self.shared.hooks.set_on_complete(Arc::new(f))
    }

    /// Registers the failure sink: `(work, error)`.
    ///
    /// Fires on every failed attempt, terminal or not.
    pub fn on_failure<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit, &str) + Send + Sync + 'static,
    {
        self.shared.hooks.set_on_failure(Arc::new(f))
    }

    /// Registers the skip sink, fired when a unit completes without running.
    pub fn on_skip<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(&WorkUnit) + Send + Sync + 'static,
    {
        self.shared.hooks.set_on_skip(Arc::new(f))
    }

    /// Registers the stall sink: `(seconds_since_progress, pending_count)`.
    pub fn on_stall_warning<F>(&self, f: F) -> Result<(), CueError>
    where
        F: Fn(f64, usize) + Send + Sync + 'static,
    {
        self.shared.hooks.set_on_stall_warning(Arc::new(f))
    }

    // --- Work operations ---

    /// Submits work, returning its id.
    ///
    /// May be called before `start`; the unit waits in the pending bag.
    /// Fails with [`CueError::UnknownTask`] for unregistered tasks and
    /// [`CueError::Shutdown`] after `stop`.
    pub async fn submit(&self, task: &str, params: Value) -> Result<String, CueError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(CueError::Shutdown);
        }
        if !self.shared.tasks.contains(task) {
            return Err(CueError::UnknownTask {
                name: task.to_string(),
            });
        }
        let unit = WorkUnit::new(task, params);
        let id = unit.id.clone();
        // Published before the insert so the submit event always precedes
        // the unit's dispatch events on the bus.
        self.shared.bus.publish(
            Event::now(EventKind::WorkSubmitted)
                .with_work(id.as_str())
                .with_task(task),
        );
        self.shared.store.insert(unit).await;
        self.shared.wakeup.notify_one();
        Ok(id)
    }

    /// Snapshot read of a work unit.
    pub async fn get(&self, id: &str) -> Option<WorkUnit> {
        self.shared.store.get(id).await
    }

    /// Snapshot read of units matching `filter`, oldest first.
    pub async fn list(&self, filter: WorkFilter) -> Vec<WorkUnit> {
        self.shared.store.list(&filter).await
    }

    /// Cancels a work unit.
    ///
    /// - pending → cancelled immediately
    /// - running → intent recorded; the handler's outcome is discarded at
    ///   completion (the handler itself is not interrupted)
    /// - terminal → no-op
    ///
    /// Returns the unit's state after the call, or `None` for unknown ids.
    pub async fn cancel(&self, id: &str) -> Option<WorkState> {
        match self.shared.store.cancel(id).await {
            CancelOutcome::NotFound => None,
            CancelOutcome::Cancelled => {
                self.shared
                    .bus
                    .publish(Event::now(EventKind::WorkCancelled).with_work(id));
                self.shared.wakeup.notify_one();
                Some(WorkState::Cancelled)
            }
            CancelOutcome::Requested => Some(WorkState::Running),
            CancelOutcome::AlreadyTerminal(state) => Some(state),
        }
    }

    // --- Lifecycle ---

    /// Starts the scheduler as a background task. Idempotent; a stopped
    /// coordinator can be started again.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut runner = self.runner.lock().expect("runner slot poisoned");
        if let Some(r) = runner.as_ref() {
            if !r.join.is_finished() {
                return;
            }
        }

        self.shared.accepting.store(true, Ordering::SeqCst);
        self.shared.draining.store(false, Ordering::SeqCst);

        let token = CancellationToken::new();
        self.spawn_subscriber_listener(&token);

        let scheduler = Scheduler::new(Arc::clone(&self.shared));
        let join = tokio::spawn(scheduler.run(token.clone()));
        *runner = Some(Runner { token, join });
    }

    /// Stops gracefully: refuses new submissions, stops dispatching, and
    /// waits up to the configured grace period for active handlers.
    pub async fn stop(&self) {
        let grace = self.shared.config.grace;
        self.stop_within(grace).await;
    }

    /// Like [`stop`](Self::stop) with an explicit grace period.
    ///
    /// Handlers are never interrupted; when the grace period elapses the
    /// coordinator logs, publishes [`EventKind::DrainTimedOut`], and
    /// returns with handlers still running detached.
    pub async fn stop_within(&self, grace: Duration) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.shared.draining.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_one();

        let runner = self.runner.lock().expect("runner slot poisoned").take();
        let Some(Runner { token, join }) = runner else {
            return;
        };
        self.shared
            .bus
            .publish(Event::now(EventKind::ShutdownRequested));

        if time::timeout(grace, join).await.is_err() {
            warn!(?grace, "shutdown grace exceeded; handlers left running");
            self.shared
                .bus
                .publish(Event::now(EventKind::DrainTimedOut));
        }
        token.cancel();
    }

    // --- Introspection ---

    /// Runs the admission evaluator over the pending snapshot without
    /// dispatching, explaining each blocked unit.
    ///
    /// Skip-eligible and dispatchable units do not appear: they will leave
    /// the pending bag on the scheduler's next pass.
    pub async fn debug_blocked(&self) -> Vec<Blocked> {
        let mut pending = self.shared.store.pending_snapshot().await;
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let now = Instant::now();
        let mut out = Vec::new();
        for work in pending {
            let task = self.shared.tasks.get(&work.task);
            let verdict = admission::evaluate(
                &work,
                task.as_deref(),
                &self.shared.services,
                &self.shared.hooks,
                now,
            );
            let service = task.as_ref().map(|t| t.service().to_string());
            if let Some((reason, details)) =
                admission::classify_blocked(verdict, &work, service.as_deref(), now)
            {
                out.push(Blocked {
                    work,
                    reason,
                    details,
                });
            }
        }
        out
    }

    /// Subscribes to the raw event stream.
    ///
    /// Prefer implementing [`Subscribe`] for long-lived observers; a raw
    /// receiver that lags past the bus capacity skips old events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Forwards bus events to the attached subscribers for one run.
    fn spawn_subscriber_listener(&self, token: &CancellationToken) {
        if self.shared.subscribers.is_empty() {
            return;
        }
        let set = SubscriberSet::new(self.shared.subscribers.clone(), self.shared.bus.clone());
        let mut rx = self.shared.bus.subscribe();
        let token = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
            set.shutdown().await;
        });
    }
}
