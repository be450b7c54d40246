//! # Handler abstraction for work execution.
//!
//! Defines the core [`Handler`] trait plus two ready-made implementations:
//!
//! - **[`HandlerFn`]** — wraps an async closure `F: Fn(WorkUnit) -> Fut`,
//!   producing a fresh future per invocation.
//! - **[`BlockingFn`]** — wraps a synchronous function and runs it on the
//!   tokio blocking pool, so CPU-bound or blocking handlers never stall the
//!   scheduler.
//!
//! ## Rules
//! - Each invocation creates a **new** future owning its own state; shared
//!   state goes through an explicit `Arc` inside the closure.
//! - Handlers receive an immutable [`WorkUnit`] snapshot and never touch
//!   coordinator state directly.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use workcue::{HandlerFn, HandlerRef, WorkUnit};
//!
//! let h: HandlerRef = HandlerFn::arc(|work: WorkUnit| async move {
//!     let input = work.params["input"].as_str().unwrap_or_default().to_string();
//!     Ok(json!({ "text": format!("extracted from {input}") }))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::error::HandlerError;
use crate::work::WorkUnit;

/// Boxed future returned by [`Handler::call`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send + 'static>>;

/// Shared handle to a handler object (`Arc<dyn Handler>`).
pub type HandlerRef = Arc<dyn Handler>;

/// A unit-of-work executor.
///
/// ## Rules
/// - **Stateless invocation**: `call(&self)` is `Fn`-like; no shared mutable
///   state between invocations
/// - **Fresh futures**: each `call()` returns a new independent future
/// - **Isolation**: a failure (or panic) in one invocation never taints
///   another; the dispatcher contains both
pub trait Handler: Send + Sync + 'static {
    /// Creates a new future that performs the work for `work`.
    fn call(&self, work: WorkUnit) -> HandlerFuture;
}

/// Async-closure-backed handler.
///
/// Wraps a closure that *creates* a new future per invocation.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(WorkUnit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn call(&self, work: WorkUnit) -> HandlerFuture {
        Box::pin((self.f)(work))
    }
}

/// Blocking-function handler.
///
/// The function runs via [`tokio::task::spawn_blocking`]; a panic inside it
/// surfaces as a retryable [`HandlerError::Fail`].
pub struct BlockingFn<F> {
    f: Arc<F>,
}

impl<F> BlockingFn<F> {
    /// Creates a new blocking handler.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F> Handler for BlockingFn<F>
where
    F: Fn(WorkUnit) -> Result<Value, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, work: WorkUnit) -> HandlerFuture {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(work)).await {
                Ok(res) => res,
                Err(join_err) => Err(HandlerError::Fail {
                    reason: if join_err.is_panic() {
                        "handler panicked".to_string()
                    } else {
                        "handler was aborted".to_string()
                    },
                }),
            }
        })
    }
}
