//! # Runtime event system.
//!
//! - [`Event`] / [`EventKind`] structured lifecycle events with ordering metadata.
//! - [`Bus`] broadcast channel carrying events to any number of subscribers.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
