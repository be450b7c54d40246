//! # Service specification.
//!
//! Declares the admission limits of one named service. Built with the
//! builder-style methods and handed to
//! [`Cue::register_service`](crate::Cue::register_service).
//!
//! ## Example
//! ```rust
//! use workcue::ServiceSpec;
//!
//! let api = ServiceSpec::new("openai")
//!     .concurrent(5)
//!     .rate_str("60/min")
//!     .unwrap();
//! let local = ServiceSpec::new("local").concurrent(4); // no rate limit
//! ```

use crate::error::CueError;
use crate::services::RateLimit;

/// Declared limits for one service.
///
/// - `concurrent = None` → unbounded concurrency
/// - `rate = None` → no rate check
/// - `concurrent = Some(1)` → strict serialisation across all tasks bound
///   to this service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSpec {
    name: String,
    concurrent: Option<usize>,
    rate: Option<RateLimit>,
}

impl ServiceSpec {
    /// Creates a spec with no limits (admits everything).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrent: None,
            rate: None,
        }
    }

    /// Sets the maximum number of simultaneously active uses.
    pub fn concurrent(mut self, limit: usize) -> Self {
        self.concurrent = Some(limit);
        self
    }

    /// Sets the sliding-window rate limit.
    pub fn rate(mut self, rate: RateLimit) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Sets the rate limit from a rate string such as `"60/min"`.
    pub fn rate_str(self, rate: &str) -> Result<Self, CueError> {
        Ok(self.rate(rate.parse()?))
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concurrency limit (`None` = unbounded).
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrent
    }

    /// Rate limit (`None` = no rate check).
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.rate
    }
}
