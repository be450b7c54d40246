//! # Error types used by the workcue coordinator and handlers.
//!
//! This module defines two main error enums:
//!
//! - [`CueError`] errors raised by the coordinator surface itself
//!   (registration, submission, lifecycle).
//! - [`HandlerError`] errors raised by individual handler invocations.
//!
//! Both types provide `as_label` for logs/metrics.
//! [`HandlerError`] additionally distinguishes retryable from fatal failures.

use thiserror::Error;

/// # Errors produced by the coordinator surface.
///
/// These represent misuse of the registration/lifecycle API, not failures
/// of the work itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CueError {
    /// Registration-time mistake: duplicate task, unknown service,
    /// conflicting service re-registration, or a callback slot that is
    /// already occupied.
    #[error("configuration error: {reason}")]
    Config {
        /// Human-readable description of the mistake.
        reason: String,
    },

    /// A rate string did not match the accepted grammar.
    #[error("invalid rate format: {input:?} ({reason})")]
    RateFormat {
        /// The string as supplied by the caller.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// `submit` named a task that is not registered.
    #[error("unknown task '{name}'")]
    UnknownTask {
        /// The unregistered task name.
        name: String,
    },

    /// `submit` was called after `stop`.
    #[error("coordinator is shut down")]
    Shutdown,
}

impl CueError {
    /// Convenience constructor for [`CueError::Config`].
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        CueError::Config {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CueError::Config { .. } => "cue_config",
            CueError::RateFormat { .. } => "cue_rate_format",
            CueError::UnknownTask { .. } => "cue_unknown_task",
            CueError::Shutdown => "cue_shutdown",
        }
    }
}

/// # Errors produced by handler execution.
///
/// A failed attempt is retried while the task's `max_attempts` allows it,
/// unless the handler declared the failure fatal.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Handler failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail { reason: String },

    /// Non-recoverable error; remaining attempts are not consumed.
    #[error("fatal error (no retry): {reason}")]
    Fatal { reason: String },
}

impl HandlerError {
    /// Creates a retryable failure.
    pub fn fail(reason: impl Into<String>) -> Self {
        HandlerError::Fail {
            reason: reason.into(),
        }
    }

    /// Creates a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        HandlerError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Fatal { .. } => "handler_fatal",
        }
    }

    /// Indicates whether the error type is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Fail { .. })
    }
}

impl From<String> for HandlerError {
    fn from(reason: String) -> Self {
        HandlerError::Fail { reason }
    }
}

impl From<&str> for HandlerError {
    fn from(reason: &str) -> Self {
        HandlerError::Fail {
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::Fail {
            reason: e.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for HandlerError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        HandlerError::Fail {
            reason: e.to_string(),
        }
    }
}
