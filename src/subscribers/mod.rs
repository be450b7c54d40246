//! # Event subscribers.
//!
//! - [`Subscribe`] extension point for plugging custom event handlers in.
//! - [`SubscriberSet`] non-blocking fan-out with per-subscriber queues.
//! - [`LogWriter`] built-in logging subscriber (feature `logging`).

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
