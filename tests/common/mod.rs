//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use workcue::{Cue, CueConfig, ServiceSpec};

/// Polls `cond` every 10 ms until it holds or `limit` elapses.
///
/// Returns true iff the condition held before the deadline.
pub async fn wait_for<F, Fut>(limit: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A coordinator with one unconstrained service `"api"` registered.
pub fn cue_with_api() -> Cue {
    let cue = Cue::new(CueConfig::default());
    cue.register_service(
        ServiceSpec::new("api")
            .concurrent(100)
            .rate_str("1000/min")
            .unwrap(),
    )
    .unwrap();
    cue
}
