//! # Workload simulator
//!
//! Drives a mock workload through the coordinator and prints a summary:
//! configurable unit count, simulated latency, and error rate, against a
//! service with bounded concurrency and rate.
//!
//! Run with: `cargo run --example simulate`
//!
//! Environment knobs:
//! - `SIM_COUNT` (default 60)
//! - `SIM_LATENCY_MS` (default 80)
//! - `SIM_ERROR_RATE` (default 0.1)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::json;
use workcue::{
    BackoffPolicy, Cue, CueConfig, EventKind, HandlerError, HandlerFn, JitterPolicy, ServiceSpec,
    TaskSpec, WorkFilter, WorkState, WorkUnit,
};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let count: usize = env_or("SIM_COUNT", 60);
    let latency_ms: u64 = env_or("SIM_LATENCY_MS", 80);
    let error_rate: f64 = env_or("SIM_ERROR_RATE", 0.1);

    println!(
        "simulating {count} units, ~{latency_ms}ms latency, {:.0}% errors",
        error_rate * 100.0
    );

    let cue = Cue::new(CueConfig {
        retry_backoff: BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        },
        ..Default::default()
    });
    cue.register_service(
        ServiceSpec::new("mock_api")
            .concurrent(5)
            .rate_str("50/sec")?,
    )?;

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    cue.register_task(
        TaskSpec::new(
            "mock_work",
            "mock_api",
            HandlerFn::arc(move |_work: WorkUnit| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    let (sleep_ms, failed) = {
                        let mut rng = rand::rng();
                        (
                            (latency_ms as f64 * rng.random_range(0.8..1.2)) as u64,
                            rng.random_bool(error_rate.clamp(0.0, 1.0)),
                        )
                    };
                    tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                    if failed {
                        return Err(HandlerError::fail("simulated error"));
                    }
                    Ok(json!({ "mock": true, "latency_ms": sleep_ms }))
                }
            }),
        )
        .max_attempts(3),
    )?;

    // Tally terminal events off the bus while the run progresses.
    let mut events = cue.subscribe();
    let tally = tokio::spawn(async move {
        let (mut completed, mut failed, mut retried) = (0usize, 0usize, 0usize);
        while let Ok(ev) = events.recv().await {
            match ev.kind {
                EventKind::WorkCompleted => completed += 1,
                EventKind::WorkFailed => failed += 1,
                EventKind::RetryScheduled => retried += 1,
                EventKind::ShutdownRequested => break,
                _ => {}
            }
        }
        (completed, failed, retried)
    });

    let begin = Instant::now();
    cue.start();
    for i in 0..count {
        cue.submit("mock_work", json!({ "i": i })).await?;
    }

    // Drain: wait until nothing is pending or running.
    loop {
        let open = cue
            .list(WorkFilter {
                state: Some(WorkState::Pending),
                limit: 1,
                ..Default::default()
            })
            .await
            .len()
            + cue
                .list(WorkFilter {
                    state: Some(WorkState::Running),
                    limit: 1,
                    ..Default::default()
                })
                .await
                .len();
        if open == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cue.stop().await;
    let elapsed = begin.elapsed();

    let (completed, failed, retried) = tally.await?;
    println!("\n── summary ──────────────────────────");
    println!("elapsed     {:.2}s", elapsed.as_secs_f64());
    println!("completed   {completed}");
    println!("failed      {failed}");
    println!("retries     {retried}");
    println!("attempts    {}", attempts.load(Ordering::Relaxed));
    println!(
        "throughput  {:.1} units/s",
        completed as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
