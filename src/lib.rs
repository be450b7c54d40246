//! # workcue
//!
//! **workcue** is an in-process work coordinator for applications that
//! drive rate-limited external services (HTTP APIs, shell commands, local
//! worker pools). It decides **when** a submitted unit of work may execute;
//! your handlers decide what it does.
//!
//! Admission per named service combines three gates:
//! 1. a maximum concurrency (at most *k* active uses at any instant),
//! 2. a sliding-window rate limit (at most *n* new uses per window *w*),
//! 3. the client predicates `is_ready` (input validity) and `is_stale`
//!    (output validity).
//!
//! The coordinator is stateless across restarts: no persistent queue, no
//! result store, no durable rate counters. Your artifacts are the truth; on
//! restart you resubmit and `is_stale` causes completed work to be skipped
//! without running.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Coordination**  | Submit, cancel, start/stop, blocked-work introspection.            | [`Cue`], [`CueConfig`]                    |
//! | **Services**      | Named admission buckets with concurrency and rate limits.          | [`ServiceSpec`], [`RateLimit`]            |
//! | **Tasks**         | Named handler bindings with attempt policies.                      | [`TaskSpec`], [`HandlerFn`], [`BlockingFn`] |
//! | **Predicates**    | Client gates over input/output validity and dispatch order.        | `is_ready`, `is_stale`, [`PriorityContext`] |
//! | **Events**        | Structured lifecycle events on a broadcast bus.                    | [`Event`], [`EventKind`], [`Subscribe`]   |
//! | **Retry pacing**  | Exponential backoff with optional jitter between attempts.         | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Errors**        | Typed surface and handler errors.                                  | [`CueError`], [`HandlerError`]            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ```no_run
//! use serde_json::json;
//! use workcue::{Cue, CueConfig, HandlerFn, ServiceSpec, TaskSpec, WorkUnit};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cue = Cue::new(CueConfig::default());
//!
//!     cue.register_service(ServiceSpec::new("openai").concurrent(5).rate_str("60/min")?)?;
//!
//!     cue.register_task(TaskSpec::new(
//!         "extract",
//!         "openai",
//!         HandlerFn::arc(|work: WorkUnit| async move {
//!             Ok(json!({ "text": format!("extracted {}", work.params["input"]) }))
//!         }),
//!     ))?;
//!
//!     // Skip work whose output already exists.
//!     cue.is_stale(|work| work.params.get("force").is_some())?;
//!
//!     cue.start();
//!     cue.submit("extract", json!({ "input": "doc.pdf" })).await?;
//!     cue.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod hooks;
mod policies;
mod services;
mod subscribers;
mod tasks;
mod work;

// ---- Public re-exports ----

pub use config::CueConfig;
pub use crate::core::{Blocked, BlockedReason, Cue};
pub use error::{CueError, HandlerError};
pub use events::{Bus, Event, EventKind};
pub use hooks::PriorityContext;
pub use policies::{BackoffPolicy, JitterPolicy};
pub use services::{RateLimit, ServiceSpec};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{BlockingFn, Handler, HandlerFn, HandlerFuture, HandlerRef, TaskSpec};
pub use work::{CancelOutcome, WorkFilter, WorkState, WorkUnit};

// Optional: expose a simple built-in logging subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
