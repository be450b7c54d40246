//! # Services: named admission buckets.
//!
//! A service executes nothing; it only bounds admission for the tasks bound
//! to it via a concurrency limit and/or a sliding-window rate limit.
//!
//! - [`RateLimit`] parsed `"N/unit"` rate specification.
//! - [`ServiceSpec`] declared limits for one service.
//! - [`ServiceTable`] live counters: active slots + dispatch-timestamp window.

mod rate;
mod spec;
mod table;

pub use rate::RateLimit;
pub use spec::ServiceSpec;
pub use table::{AdmitState, ServiceTable};
