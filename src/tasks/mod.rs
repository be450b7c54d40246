//! # Task types and handlers.
//!
//! - [`Handler`] / [`HandlerRef`] / [`HandlerFuture`] the unit-of-work abstraction.
//! - [`HandlerFn`] async-closure-backed handler.
//! - [`BlockingFn`] blocking-function handler (runs on the blocking pool).
//! - [`TaskSpec`] a registered task type: name, service, handler, attempt policy.

mod handler;
mod registry;
mod spec;

pub use handler::{BlockingFn, Handler, HandlerFn, HandlerFuture, HandlerRef};
pub use spec::TaskSpec;

pub(crate) use registry::TaskRegistry;
