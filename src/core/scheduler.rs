//! # Scheduler loop.
//!
//! The single coordinating task. Repeatedly snapshots the pending bag,
//! ranks it, applies the admission evaluator, dispatches winners, accounts
//! for handler completions, and enforces the age policies.
//!
//! ## Architecture
//! ```text
//! submit/cancel ──► WorkStore ──┐
//!                               ▼
//!            ┌──────────► Scheduler::run()
//!   wakeup ──┤                 │
//!   tick ────┤                 ├─► scan(): rank pending → evaluate → dispatch/skip
//!   mailbox ─┘                 ├─► check_timeouts(): pending/stall policies
//!                              └─► handle_completion(): release → transition → sinks
//!                                        ▲
//!        handler tasks ── Completion ────┘
//! ```
//!
//! ## Rules
//! - All service-counter mutations and terminal transitions flow through
//!   this task, so event sinks fire in terminal-transition order.
//! - Client predicates run synchronously here; the documented contract is
//!   that they return quickly.
//! - A walk dispatches greedily in rank order; a blocked item never
//!   prevents a later admissible item from dispatching.
//! - Drain mode (after `stop`) processes completions but neither dispatches
//!   nor expires anything.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::admission::{self, Verdict};
use crate::core::cue::Shared;
use crate::core::dispatch::{self, Completion};
use crate::events::{Event, EventKind};
use crate::hooks::PriorityContext;
use crate::tasks::TaskSpec;
use crate::work::WorkUnit;

pub(crate) struct Scheduler {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    /// Ids already given a pending-age warning (once per item).
    warned_pending: HashSet<String>,
    /// Wall time of the last terminal transition, or of loop start.
    last_progress: Instant,
    /// A stall warning was issued for the current no-progress span.
    stall_warned: bool,
}

impl Scheduler {
    pub fn new(shared: Arc<Shared>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared,
            tx,
            rx,
            warned_pending: HashSet::new(),
            last_progress: Instant::now(),
            stall_warned: false,
        }
    }

    /// Runs until cancellation, or until a requested drain completes.
    pub async fn run(mut self, token: CancellationToken) {
        self.shared.bus.publish(Event::now(EventKind::SchedulerStarted));
        self.last_progress = Instant::now();

        loop {
            // Apply everything the handlers reported since the last pass.
            while let Ok(c) = self.rx.try_recv() {
                self.handle_completion(c).await;
            }
            if token.is_cancelled() {
                break;
            }

            let draining = self.shared.draining.load(Ordering::SeqCst);
            if draining {
                if self.shared.store.active_count().await == 0 {
                    break;
                }
            } else {
                self.scan().await;
                self.check_timeouts().await;
                if self.shared.draining.load(Ordering::SeqCst)
                    && self.shared.store.active_count().await == 0
                {
                    break;
                }
            }

            let shared = Arc::clone(&self.shared);
            let tick = shared.config.tick;
            tokio::select! {
                _ = token.cancelled() => break,
                maybe = self.rx.recv() => {
                    if let Some(c) = maybe {
                        self.handle_completion(c).await;
                    }
                }
                _ = shared.wakeup.notified() => {}
                _ = time::sleep(tick) => {}
            }
        }
    }

    /// One pass over the pending bag: rank, evaluate, dispatch.
    async fn scan(&mut self) {
        let pending = self.shared.store.pending_snapshot().await;
        if pending.is_empty() {
            return;
        }

        let depth = pending.len();
        let now_wall = SystemTime::now();
        let mut ranked: Vec<(f64, WorkUnit)> = pending
            .into_iter()
            .map(|work| {
                let ctx = PriorityContext {
                    work: &work,
                    wait_time: work.wait_time(now_wall),
                    queue_depth: depth,
                };
                let key = admission::priority_key(&self.shared.hooks, &ctx);
                (key, work)
            })
            .collect();
        // Highest key first; ties broken oldest-first for forward progress.
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.created_at.cmp(&b.1.created_at))
        });

        for (_, work) in ranked {
            let task = self.shared.tasks.get(&work.task);
            let verdict = admission::evaluate(
                &work,
                task.as_deref(),
                &self.shared.services,
                &self.shared.hooks,
                Instant::now(),
            );
            match (verdict, task) {
                (Verdict::Skip, _) => self.apply_skip(&work).await,
                (Verdict::Dispatch, Some(task)) => self.dispatch(&work, task).await,
                (v, _) => {
                    debug!(work = %work.id, verdict = ?v, "holding pending item");
                }
            }
        }
    }

    /// Skip transition: output still valid, complete without running.
    async fn apply_skip(&mut self, work: &WorkUnit) {
        let Some(snap) = self.shared.store.skip(&work.id).await else {
            return; // lost a race with cancel
        };
        self.shared.hooks.skip(&snap);
        self.shared.bus.publish(
            Event::now(EventKind::WorkSkipped)
                .with_work(snap.id.as_str())
                .with_task(snap.task.as_str()),
        );
        self.progress();
    }

    /// Reserve, transition to running, fire `on_start`, launch the handler.
    async fn dispatch(&mut self, work: &WorkUnit, task: Arc<TaskSpec>) {
        if !self
            .shared
            .services
            .try_reserve(task.service(), Instant::now())
        {
            return; // admission changed since evaluation
        }
        let Some(snap) = self.shared.store.move_to_active(&work.id).await else {
            // Cancelled between snapshot and dispatch: give the slot back.
            self.shared.services.release(task.service());
            return;
        };
        self.shared.hooks.start(&snap);
        self.shared.bus.publish(
            Event::now(EventKind::WorkStarted)
                .with_work(snap.id.as_str())
                .with_task(snap.task.as_str())
                .with_attempt(snap.attempt),
        );
        dispatch::spawn(snap, task, self.tx.clone());
    }

    /// Applies the release/transition/event sequence for one finished attempt.
    async fn handle_completion(&mut self, c: Completion) {
        self.shared.services.release(&c.service);

        let Some(current) = self.shared.store.get(&c.id).await else {
            self.shared.wakeup.notify_one();
            return;
        };

        if current.cancel_requested {
            // Cancellation intent wins: discard the handler's outcome.
            if let Some(snap) = self.shared.store.mark_cancelled(&c.id).await {
                self.shared.bus.publish(
                    Event::now(EventKind::WorkCancelled).with_work(snap.id.as_str()),
                );
                self.progress();
            }
            self.shared.wakeup.notify_one();
            return;
        }

        match c.outcome {
            Ok(value) => {
                if let Some(snap) = self.shared.store.complete(&c.id, value.clone()).await {
                    self.shared
                        .hooks
                        .complete(&snap, &value, c.duration.as_secs_f64());
                    self.shared.bus.publish(
                        Event::now(EventKind::WorkCompleted)
                            .with_work(snap.id.as_str())
                            .with_task(snap.task.as_str())
                            .with_duration(c.duration),
                    );
                    self.progress();
                }
            }
            Err(err) => {
                let attempts_allowed = self
                    .shared
                    .tasks
                    .get(&c.task)
                    .map(|t| t.attempts_allowed())
                    .unwrap_or(1);
                let msg = err.to_string();
                let will_retry = err.is_retryable() && current.attempt < attempts_allowed;

                if will_retry {
                    let delay = self
                        .shared
                        .config
                        .retry_backoff
                        .delay_for_attempt(current.attempt);
                    if let Some(snap) = self
                        .shared
                        .store
                        .requeue(&c.id, msg.as_str(), Instant::now() + delay)
                        .await
                    {
                        self.shared.hooks.failure(&snap, &msg);
                        self.shared.bus.publish(
                            Event::now(EventKind::RetryScheduled)
                                .with_work(snap.id.as_str())
                                .with_task(snap.task.as_str())
                                .with_attempt(current.attempt)
                                .with_delay(delay)
                                .with_error(msg.as_str()),
                        );
                    }
                } else if let Some(snap) = self.shared.store.fail(&c.id, msg.as_str()).await {
                    self.shared.hooks.failure(&snap, &msg);
                    self.shared.bus.publish(
                        Event::now(EventKind::WorkFailed)
                            .with_work(snap.id.as_str())
                            .with_task(snap.task.as_str())
                            .with_attempt(current.attempt)
                            .with_error(msg.as_str()),
                    );
                    self.progress();
                }
            }
        }

        self.shared.wakeup.notify_one();
    }

    /// Enforces the pending-timeout and stall-timeout policies.
    async fn check_timeouts(&mut self) {
        let cfg = self.shared.config.clone();
        if cfg.pending_timeout.is_none()
            && cfg.pending_warn_after.is_none()
            && cfg.stall_timeout.is_none()
            && cfg.stall_warn_after.is_none()
        {
            return;
        }

        let pending = self.shared.store.pending_snapshot().await;
        if pending.is_empty() {
            return;
        }
        let now_wall = SystemTime::now();

        if let Some(limit) = cfg.pending_timeout {
            for work in &pending {
                let age = now_wall
                    .duration_since(work.created_at)
                    .unwrap_or_default();
                if age <= limit {
                    continue;
                }
                let error = format!("pending timeout after {:.1}s", limit.as_secs_f64());
                if let Some(snap) = self.shared.store.expire(&work.id, error.as_str()).await {
                    warn!(work = %snap.id, task = %snap.task, "pending timeout");
                    self.shared.hooks.failure(&snap, &error);
                    self.shared.bus.publish(
                        Event::now(EventKind::PendingExpired)
                            .with_work(snap.id.as_str())
                            .with_task(snap.task.as_str())
                            .with_error(error.as_str()),
                    );
                    self.shared.bus.publish(
                        Event::now(EventKind::WorkFailed)
                            .with_work(snap.id.as_str())
                            .with_task(snap.task.as_str())
                            .with_error(error.as_str()),
                    );
                    self.progress();
                }
            }
        }

        if let Some(warn_after) = cfg.pending_warn_after {
            for work in &pending {
                let age = now_wall
                    .duration_since(work.created_at)
                    .unwrap_or_default();
                if age <= warn_after || self.warned_pending.contains(&work.id) {
                    continue;
                }
                // The timeout pass above may have just expired it.
                let still_pending = self
                    .shared
                    .store
                    .get(&work.id)
                    .await
                    .is_some_and(|u| u.state == crate::work::WorkState::Pending);
                if !still_pending {
                    continue;
                }
                self.warned_pending.insert(work.id.clone());
                warn!(
                    work = %work.id,
                    task = %work.task,
                    age_seconds = age.as_secs_f64(),
                    "work pending longer than warn threshold"
                );
                self.shared.hooks.stall_warning(age.as_secs_f64(), pending.len());
                self.shared.bus.publish(
                    Event::now(EventKind::StallWarning)
                        .with_work(work.id.as_str())
                        .with_task(work.task.as_str())
                        .with_pending(pending.len()),
                );
            }
        }

        let since = self.last_progress.elapsed();
        let still_pending = self.shared.store.pending_count().await;
        if still_pending == 0 {
            return;
        }

        if let Some(limit) = cfg.stall_timeout {
            if since > limit {
                let error = format!(
                    "stalled: no progress for {:.1}s",
                    since.as_secs_f64()
                );
                warn!(pending = still_pending, "stall timeout; failing all pending work");
                for work in self.shared.store.pending_snapshot().await {
                    if let Some(snap) = self.shared.store.expire(&work.id, error.as_str()).await {
                        self.shared.hooks.failure(&snap, &error);
                        self.shared.bus.publish(
                            Event::now(EventKind::WorkFailed)
                                .with_work(snap.id.as_str())
                                .with_task(snap.task.as_str())
                                .with_error(error.as_str()),
                        );
                    }
                }
                self.shared.bus.publish(
                    Event::now(EventKind::StallExpired)
                        .with_pending(still_pending)
                        .with_error(error.as_str()),
                );
                self.progress();
                return;
            }
        }

        if let Some(warn_after) = cfg.stall_warn_after {
            if since > warn_after && !self.stall_warned {
                self.stall_warned = true;
                warn!(
                    pending = still_pending,
                    seconds_since_progress = since.as_secs_f64(),
                    "no progress while work is pending"
                );
                self.shared
                    .hooks
                    .stall_warning(since.as_secs_f64(), still_pending);
                self.shared.bus.publish(
                    Event::now(EventKind::StallWarning).with_pending(still_pending),
                );
            }
        }
    }

    /// Records a terminal transition for stall accounting.
    fn progress(&mut self) {
        self.last_progress = Instant::now();
        self.stall_warned = false;
    }
}
