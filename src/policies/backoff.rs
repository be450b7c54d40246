//! # Backoff policy for retrying failed work.
//!
//! [`BackoffPolicy`] controls how the delay before re-dispatching a failed
//! work unit grows with its attempt count. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the delay after the first failed attempt;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use workcue::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // After the first failed attempt: 1s.
//! assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(1));
//! // Doubles per attempt: 2s, 4s, 8s ...
//! assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(4));
//! // ... capped at `max`.
//! assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Retry backoff policy.
///
/// Encapsulates parameters that determine how retry delays grow:
/// - [`factor`](Self::factor) multiplicative growth factor;
/// - [`first`](Self::first) the delay after the first failed attempt;
/// - [`max`](Self::max) the maximum delay cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before re-dispatching after the first failed attempt.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent synchronized retries.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `first = 1s`;
    /// - `factor = 2.0` (doubling);
    /// - `max = 30s`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before re-dispatching a unit whose `attempt`-th
    /// invocation just failed (`attempt` is 1-based).
    ///
    /// The base delay is `first * factor^(attempt - 1)`, capped at `max`,
    /// then jittered per [`JitterPolicy`]. `attempt = 0` is treated as 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let mul = self.factor.powi(exp.min(i32::MAX as u32) as i32);

        let base = if !mul.is_finite() || mul < 0.0 {
            self.max
        } else {
            let scaled = self.first.as_secs_f64() * mul;
            if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
                self.max
            } else {
                Duration::from_secs_f64(scaled)
            }
        };

        self.jitter.apply(base.min(self.max))
    }
}
