//! # Retry pacing policies.
//!
//! - [`BackoffPolicy`] how retry delays grow across attempts.
//! - [`JitterPolicy`] optional randomization of those delays.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
