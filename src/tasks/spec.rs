//! # Task specification.
//!
//! A [`TaskSpec`] binds a task name to the service it uses, the handler
//! that performs the work, and its attempt policy. Created once at
//! registration and never mutated.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use workcue::{HandlerFn, TaskSpec, WorkUnit};
//!
//! let spec = TaskSpec::new(
//!     "extract",
//!     "openai",
//!     HandlerFn::arc(|_work: WorkUnit| async move { Ok(json!({"text": "..."})) }),
//! )
//! .max_attempts(3)
//! .timeout(Duration::from_secs(120));
//! ```

use std::time::Duration;

use crate::tasks::HandlerRef;

/// A registered task type.
#[derive(Clone)]
pub struct TaskSpec {
    name: String,
    service: String,
    handler: HandlerRef,
    max_attempts: u32,
    timeout: Option<Duration>,
}

impl TaskSpec {
    /// Creates a task spec with a single attempt and no timeout.
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        handler: HandlerRef,
    ) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            handler,
            max_attempts: 1,
            timeout: None,
        }
    }

    /// Sets the maximum number of attempts before a failure is terminal.
    ///
    /// Values below 1 are clamped to 1.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets a per-attempt handler timeout.
    ///
    /// An attempt that exceeds it is treated as a retryable failure.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the service this task admits through.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The handler invoked per attempt.
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Maximum attempts (>= 1).
    pub fn attempts_allowed(&self) -> u32 {
        self.max_attempts
    }

    /// Per-attempt timeout, if configured.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
