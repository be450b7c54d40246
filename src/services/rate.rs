//! # Rate-limit grammar.
//!
//! ```text
//! rate  := INT "/" unit
//! unit  := "sec" | "min" | "hour" | INT    // INT means that many seconds
//! ```
//!
//! The unit aliases `s`/`second`, `m`/`minute`, and `h`/`hr` are accepted
//! for compatibility with existing clients.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use workcue::RateLimit;
//!
//! let r: RateLimit = "60/min".parse().unwrap();
//! assert_eq!(r.count, 60);
//! assert_eq!(r.window, Duration::from_secs(60));
//!
//! let r: RateLimit = "3/60".parse().unwrap();
//! assert_eq!(r.window, Duration::from_secs(60));
//!
//! assert!("60/fortnight".parse::<RateLimit>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CueError;

/// A sliding-window rate specification: at most `count` dispatches per `window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum number of dispatches inside one window.
    pub count: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    /// Creates a rate limit of `count` dispatches per `window`.
    pub fn new(count: u32, window: Duration) -> Self {
        Self { count, window }
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.window.as_secs())
    }
}

impl FromStr for RateLimit {
    type Err = CueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| CueError::RateFormat {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split('/');
        let (count, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(u), None) => (c, u),
            _ => return Err(err("expected '<count>/<unit>', e.g. '60/min'")),
        };

        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| err("count must be a non-negative integer"))?;

        let window = match unit.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" => Duration::from_secs(1),
            "m" | "min" | "minute" => Duration::from_secs(60),
            "h" | "hr" | "hour" => Duration::from_secs(3600),
            other => {
                let secs: u64 = other.parse().map_err(|_| {
                    err("unknown rate unit; use 'sec', 'min', 'hour', or a number of seconds")
                })?;
                if secs == 0 {
                    return Err(err("window must be positive"));
                }
                Duration::from_secs(secs)
            }
        };

        Ok(RateLimit { count, window })
    }
}
