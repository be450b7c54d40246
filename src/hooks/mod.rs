//! # Client callbacks: predicates and event sinks.
//!
//! - [`PriorityContext`] argument to the priority callback.
//! - [`Hooks`] the exclusive registration slots plus contained invocation.

mod context;
mod registry;

pub use context::PriorityContext;

pub(crate) use registry::{panic_message, Hooks};
