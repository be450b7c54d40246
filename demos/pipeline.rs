//! # Gated two-stage pipeline
//!
//! Demonstrates basic workcue features:
//! - Readiness gating (`consume` waits for `produce`'s artifact)
//! - Staleness skipping (re-submitted `produce` is skipped)
//! - Event observation via the built-in LogWriter subscriber
//!
//! Run with: `cargo run --example pipeline --features logging`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use workcue::{Cue, CueConfig, HandlerFn, LogWriter, ServiceSpec, TaskSpec, WorkUnit};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // The artifact store stands in for files on disk: the coordinator never
    // touches it, only the handlers and predicates do.
    let artifacts: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));

    let cue = Cue::with_subscribers(CueConfig::default(), vec![Arc::new(LogWriter)]);
    cue.register_service(
        ServiceSpec::new("api")
            .concurrent(2)
            .rate_str("100/min")?,
    )?;

    let store = Arc::clone(&artifacts);
    cue.register_task(TaskSpec::new(
        "produce",
        "api",
        HandlerFn::arc(move |work: WorkUnit| {
            let store = Arc::clone(&store);
            async move {
                let key = work.params["key"].as_str().unwrap_or_default().to_string();
                tokio::time::sleep(Duration::from_millis(200)).await;
                store.lock().unwrap().insert(key.clone(), format!("data for {key}"));
                Ok(json!({ "key": key }))
            }
        }),
    ))?;

    let store = Arc::clone(&artifacts);
    cue.register_task(TaskSpec::new(
        "consume",
        "api",
        HandlerFn::arc(move |work: WorkUnit| {
            let store = Arc::clone(&store);
            async move {
                let key = work.params["key"].as_str().unwrap_or_default();
                let value = store.lock().unwrap().get(key).cloned().unwrap_or_default();
                Ok(json!({ "value": value.to_uppercase() }))
            }
        }),
    ))?;

    // Consumers are ready once their producer's artifact exists.
    let gate = Arc::clone(&artifacts);
    cue.is_ready(move |work| {
        if work.task == "consume" {
            let key = work.params["key"].as_str().unwrap_or_default();
            gate.lock().unwrap().contains_key(key)
        } else {
            true
        }
    })?;

    // Producers whose artifact already exists are skipped.
    let freshness = Arc::clone(&artifacts);
    cue.is_stale(move |work| {
        if work.task == "produce" {
            let key = work.params["key"].as_str().unwrap_or_default();
            !freshness.lock().unwrap().contains_key(key)
        } else {
            true
        }
    })?;

    cue.start();

    // Submit consumers first: they wait until their producers finish.
    for key in ["alpha", "beta"] {
        cue.submit("consume", json!({ "key": key })).await?;
        cue.submit("produce", json!({ "key": key })).await?;
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    // Resubmitting a producer now skips: the artifact is already there.
    cue.submit("produce", json!({ "key": "alpha" })).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    cue.stop().await;

    println!("\nartifacts: {:?}", artifacts.lock().unwrap());
    Ok(())
}
