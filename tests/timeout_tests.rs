mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use workcue::{Cue, CueConfig, HandlerFn, ServiceSpec, TaskSpec, WorkState, WorkUnit};

use common::wait_for;

fn cue_with(config: CueConfig) -> Cue {
    let cue = Cue::new(config);
    cue.register_service(
        ServiceSpec::new("api")
            .concurrent(100)
            .rate_str("1000/min")
            .unwrap(),
    )
    .unwrap();
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();
    cue
}

#[tokio::test]
async fn pending_timeout_fails_unready_work() {
    let cue = cue_with(CueConfig {
        pending_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    cue.is_ready(|_w| false).unwrap();

    cue.start();
    let id = cue.submit("task", json!({})).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cue.get(&id).await.unwrap().state, WorkState::Pending);

    assert!(
        wait_for(Duration::from_secs(1), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop().await;

    let work = cue.get(&id).await.unwrap();
    assert!(work.error.as_deref().unwrap().contains("pending timeout"));
    assert!(work.started_at.is_none());
}

#[tokio::test]
async fn pending_timeout_spares_dispatchable_work() {
    let cue = cue_with(CueConfig {
        pending_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    });

    cue.start();
    let id = cue.submit("task", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_millis(500), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Completed }
        })
        .await
    );
    cue.stop().await;
}

#[tokio::test]
async fn pending_warn_fires_once_per_item() {
    let cue = cue_with(CueConfig {
        pending_warn_after: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    cue.is_ready(|_w| false).unwrap();

    let warnings = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&warnings);
    cue.on_stall_warning(move |_secs, _pending| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    cue.start();
    let id = cue.submit("task", json!({})).await.unwrap();

    assert!(
        wait_for(Duration::from_secs(1), || {
            let warnings = Arc::clone(&warnings);
            async move { warnings.load(Ordering::SeqCst) == 1 }
        })
        .await
    );
    // Stays warned exactly once while still pending.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(warnings.load(Ordering::SeqCst), 1);
    assert_eq!(cue.get(&id).await.unwrap().state, WorkState::Pending);
    cue.stop().await;
}

#[tokio::test]
async fn stall_timeout_fails_all_pending() {
    let cue = cue_with(CueConfig {
        stall_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    cue.is_ready(|_w| false).unwrap();

    cue.start();
    let a = cue.submit("task", json!({})).await.unwrap();
    let b = cue.submit("task", json!({})).await.unwrap();

    assert!(
        wait_for(Duration::from_millis(600), || {
            let cue = &cue;
            let (a, b) = (a.clone(), b.clone());
            async move {
                cue.get(&a).await.unwrap().state == WorkState::Failed
                    && cue.get(&b).await.unwrap().state == WorkState::Failed
            }
        })
        .await
    );
    cue.stop().await;

    let work = cue.get(&a).await.unwrap();
    assert!(work.error.as_deref().unwrap().contains("stall"));
}

#[tokio::test]
async fn completions_reset_the_stall_clock() {
    let cue = cue_with(CueConfig {
        stall_timeout: Some(Duration::from_millis(400)),
        ..Default::default()
    });

    cue.start();
    // A steady trickle of completable work keeps progress fresh; the
    // stall policy must not fire.
    let mut ids = Vec::new();
    for _ in 0..4 {
        let id = cue.submit("task", json!({})).await.unwrap();
        ids.push(id);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    cue.stop().await;

    for id in ids {
        assert_eq!(cue.get(&id).await.unwrap().state, WorkState::Completed);
    }
}

#[tokio::test]
async fn stall_warning_reports_pending_depth() {
    let cue = cue_with(CueConfig {
        stall_warn_after: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    cue.is_ready(|_w| false).unwrap();

    let seen = Arc::new(Mutex::new(Vec::<(f64, usize)>::new()));
    let sink = Arc::clone(&seen);
    cue.on_stall_warning(move |secs, pending| {
        sink.lock().unwrap().push((secs, pending));
    })
    .unwrap();

    cue.start();
    cue.submit("task", json!({})).await.unwrap();
    cue.submit("task", json!({})).await.unwrap();

    assert!(
        wait_for(Duration::from_secs(1), || {
            let seen = Arc::clone(&seen);
            async move { !seen.lock().unwrap().is_empty() }
        })
        .await
    );
    cue.stop().await;

    let seen = seen.lock().unwrap();
    // One warning per threshold crossing; both items still pending.
    assert_eq!(seen.len(), 1);
    assert!(seen[0].0 >= 0.1);
    assert_eq!(seen[0].1, 2);
}
