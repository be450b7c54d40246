//! # Throttled fetch fan-out
//!
//! Demonstrates service admission limits:
//! - `concurrent=2` bounds simultaneous "requests"
//! - `rate="5/sec"` paces dispatches through a sliding window
//! - `debug_blocked` explains why the queue is waiting
//!
//! Run with: `cargo run --example throttled_fetch --features logging`

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use workcue::{Cue, CueConfig, HandlerFn, LogWriter, ServiceSpec, TaskSpec, WorkFilter, WorkState, WorkUnit};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cue = Cue::with_subscribers(CueConfig::default(), vec![Arc::new(LogWriter)]);
    cue.register_service(
        ServiceSpec::new("upstream")
            .concurrent(2)
            .rate_str("5/sec")?,
    )?;

    let begin = Instant::now();
    cue.register_task(TaskSpec::new(
        "fetch",
        "upstream",
        HandlerFn::arc(move |work: WorkUnit| async move {
            let page = work.params["page"].as_u64().unwrap_or(0);
            // Stand-in for a real HTTP call.
            tokio::time::sleep(Duration::from_millis(120)).await;
            Ok(json!({ "page": page, "bytes": 1024 + page * 7 }))
        }),
    ))?;

    cue.on_complete(move |work, result, duration| {
        println!(
            "  +{:>5.2}s fetched page {} ({} bytes) in {:.0}ms",
            begin.elapsed().as_secs_f64(),
            work.params["page"],
            result["bytes"],
            duration * 1000.0
        );
    })?;

    cue.start();
    for page in 0..12u64 {
        cue.submit("fetch", json!({ "page": page })).await?;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("\nblocked after 500ms:");
    for entry in cue.debug_blocked().await {
        println!(
            "  {} [{}] {}",
            entry.work.params["page"], entry.reason, entry.details
        );
    }
    println!();

    // Wait for the queue to drain, then shut down.
    loop {
        let pending = cue
            .list(WorkFilter {
                state: Some(WorkState::Pending),
                ..Default::default()
            })
            .await;
        let running = cue
            .list(WorkFilter {
                state: Some(WorkState::Running),
                ..Default::default()
            })
            .await;
        if pending.is_empty() && running.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    cue.stop().await;

    println!("done in {:.2}s", begin.elapsed().as_secs_f64());
    Ok(())
}
