mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use workcue::{
    BackoffPolicy, BlockingFn, Cue, CueConfig, HandlerError, HandlerFn, JitterPolicy, ServiceSpec,
    TaskSpec, WorkState, WorkUnit,
};

use common::{cue_with_api, wait_for};

/// Coordinator with fast retry pacing so attempt tests stay quick.
fn cue_fast_retries() -> Cue {
    let cue = Cue::new(CueConfig {
        retry_backoff: BackoffPolicy {
            first: Duration::from_millis(20),
            max: Duration::from_millis(100),
            factor: 2.0,
            jitter: JitterPolicy::None,
        },
        ..Default::default()
    });
    cue.register_service(
        ServiceSpec::new("api")
            .concurrent(100)
            .rate_str("1000/min")
            .unwrap(),
    )
    .unwrap();
    cue
}

#[tokio::test]
async fn handler_result_is_recorded() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "double",
        "api",
        HandlerFn::arc(|work: WorkUnit| async move {
            let n = work.params["n"].as_i64().unwrap_or(0);
            Ok(json!({ "doubled": n * 2 }))
        }),
    ))
    .unwrap();

    cue.start();
    let id = cue.submit("double", json!({"n": 21})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state.is_terminal() }
        })
        .await
    );
    cue.stop().await;

    let work = cue.get(&id).await.unwrap();
    assert_eq!(work.state, WorkState::Completed);
    assert_eq!(work.result, Some(json!({"doubled": 42})));
    assert!(work.error.is_none());
}

#[tokio::test]
async fn handler_error_fails_the_unit() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "broken",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move {
            Err::<serde_json::Value, _>(HandlerError::fail("connection refused"))
        }),
    ))
    .unwrap();

    let failures = Arc::new(Mutex::new(Vec::<(String, String)>::new()));
    let sink = Arc::clone(&failures);
    cue.on_failure(move |work, error| {
        sink.lock().unwrap().push((work.id.clone(), error.to_string()));
    })
    .unwrap();

    cue.start();
    let id = cue.submit("broken", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop().await;

    let work = cue.get(&id).await.unwrap();
    assert!(work.error.as_deref().unwrap().contains("connection refused"));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, id);
}

#[tokio::test]
async fn failed_attempts_retry_until_success() {
    let cue = cue_fast_retries();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    cue.register_task(
        TaskSpec::new(
            "flaky",
            "api",
            HandlerFn::arc(move |_w: WorkUnit| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(HandlerError::fail("transient"))
                    } else {
                        Ok(json!({"ok": true}))
                    }
                }
            }),
        )
        .max_attempts(5),
    )
    .unwrap();

    cue.start();
    let id = cue.submit("flaky", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(3), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Completed }
        })
        .await
    );
    cue.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let work = cue.get(&id).await.unwrap();
    assert_eq!(work.attempt, 3);
}

#[tokio::test]
async fn attempts_are_bounded_by_max_attempts() {
    let cue = cue_fast_retries();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    cue.register_task(
        TaskSpec::new(
            "hopeless",
            "api",
            HandlerFn::arc(move |_w: WorkUnit| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<serde_json::Value, _>(HandlerError::fail("always down"))
                }
            }),
        )
        .max_attempts(3),
    )
    .unwrap();

    cue.start();
    let id = cue.submit("hopeless", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(3), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cue.get(&id).await.unwrap().attempt, 3);
}

#[tokio::test]
async fn fatal_errors_skip_remaining_attempts() {
    let cue = cue_fast_retries();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    cue.register_task(
        TaskSpec::new(
            "poisoned",
            "api",
            HandlerFn::arc(move |_w: WorkUnit| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<serde_json::Value, _>(HandlerError::fatal("bad credentials"))
                }
            }),
        )
        .max_attempts(5),
    )
    .unwrap();

    cue.start();
    let id = cue.submit("poisoned", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_panic_is_contained_as_failure() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "exploding",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move {
            if true {
                panic!("handler blew up");
            }
            Ok(json!({}))
        }),
    ))
    .unwrap();

    cue.start();
    let id = cue.submit("exploding", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop().await;

    let work = cue.get(&id).await.unwrap();
    assert!(work.error.as_deref().unwrap().contains("panicked"));
}

#[tokio::test]
async fn blocking_handlers_run_on_the_blocking_pool() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "blocking",
        "api",
        BlockingFn::arc(|work: WorkUnit| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(json!({ "echo": work.params["v"] }))
        }),
    ))
    .unwrap();

    cue.start();
    let id = cue.submit("blocking", json!({"v": 7})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Completed }
        })
        .await
    );
    cue.stop().await;

    assert_eq!(cue.get(&id).await.unwrap().result, Some(json!({"echo": 7})));
}

#[tokio::test]
async fn attempt_timeout_fails_slow_handlers() {
    let cue = cue_with_api();
    cue.register_task(
        TaskSpec::new(
            "slow",
            "api",
            HandlerFn::arc(|_w: WorkUnit| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!({}))
            }),
        )
        .timeout(Duration::from_millis(50)),
    )
    .unwrap();

    cue.start();
    let id = cue.submit("slow", json!({})).await.unwrap();
    assert!(
        wait_for(Duration::from_secs(2), || {
            let cue = &cue;
            let id = id.clone();
            async move { cue.get(&id).await.unwrap().state == WorkState::Failed }
        })
        .await
    );
    cue.stop_within(Duration::from_millis(100)).await;

    let work = cue.get(&id).await.unwrap();
    assert!(work.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn max_concurrent_is_respected() {
    let cue = Cue::new(CueConfig::default());
    cue.register_service(
        ServiceSpec::new("api")
            .concurrent(2)
            .rate_str("1000/min")
            .unwrap(),
    )
    .unwrap();

    let running = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let (running_h, max_h) = (Arc::clone(&running), Arc::clone(&max_seen));
    cue.register_task(TaskSpec::new(
        "work",
        "api",
        HandlerFn::arc(move |_w: WorkUnit| {
            let running = Arc::clone(&running_h);
            let max_seen = Arc::clone(&max_h);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(json!({}))
            }
        }),
    ))
    .unwrap();

    cue.start();
    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(cue.submit("work", json!({})).await.unwrap());
    }
    assert!(
        wait_for(Duration::from_secs(3), || {
            let cue = &cue;
            let ids = ids.clone();
            async move {
                for id in &ids {
                    if cue.get(id).await.unwrap().state != WorkState::Completed {
                        return false;
                    }
                }
                true
            }
        })
        .await
    );
    cue.stop().await;

    assert!(
        max_seen.load(Ordering::SeqCst) <= 2,
        "observed {} concurrent handlers on a concurrent=2 service",
        max_seen.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn concurrent_one_serializes_strictly() {
    let cue = Cue::new(CueConfig::default());
    cue.register_service(ServiceSpec::new("serial").concurrent(1))
        .unwrap();

    // Windows of (start, end) per handler; strict serialisation means no
    // window may open before the previous one closed.
    let windows = Arc::new(Mutex::new(Vec::<(std::time::Instant, std::time::Instant)>::new()));
    let sink = Arc::clone(&windows);
    cue.register_task(TaskSpec::new(
        "step",
        "serial",
        HandlerFn::arc(move |_w: WorkUnit| {
            let sink = Arc::clone(&sink);
            async move {
                let begin = std::time::Instant::now();
                tokio::time::sleep(Duration::from_millis(15)).await;
                sink.lock().unwrap().push((begin, std::time::Instant::now()));
                Ok(json!({}))
            }
        }),
    ))
    .unwrap();

    cue.start();
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(cue.submit("step", json!({})).await.unwrap());
    }
    assert!(
        wait_for(Duration::from_secs(3), || {
            let windows = Arc::clone(&windows);
            async move { windows.lock().unwrap().len() == 4 }
        })
        .await
    );
    cue.stop().await;

    let mut windows = windows.lock().unwrap().clone();
    windows.sort_by_key(|w| w.0);
    for pair in windows.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "handlers on a concurrent=1 service overlapped"
        );
    }
}
