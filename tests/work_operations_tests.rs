mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use workcue::{CueError, HandlerFn, TaskSpec, WorkFilter, WorkState, WorkUnit};

use common::{cue_with_api, wait_for};

#[tokio::test]
async fn submit_unknown_task_is_rejected() {
    let cue = cue_with_api();
    let err = cue.submit("nonexistent", json!({})).await.unwrap_err();
    assert!(matches!(err, CueError::UnknownTask { .. }));
    assert!(err.to_string().contains("Unknown task") || err.to_string().contains("unknown task"));
}

#[tokio::test]
async fn get_nonexistent_work_returns_none() {
    let cue = cue_with_api();
    assert!(cue.get("nonexistent_id").await.is_none());
}

#[tokio::test]
async fn cancel_nonexistent_work_returns_none() {
    let cue = cue_with_api();
    assert!(cue.cancel("nonexistent_id").await.is_none());
}

#[tokio::test]
async fn submitted_work_starts_pending_with_timestamps() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();

    // Not started: the unit waits in the pending bag.
    let id = cue.submit("task", json!({"key": "a"})).await.unwrap();
    let work = cue.get(&id).await.unwrap();
    assert_eq!(work.state, WorkState::Pending);
    assert_eq!(work.task, "task");
    assert_eq!(work.params["key"], "a");
    assert_eq!(work.attempt, 0);
    assert!(work.started_at.is_none());
    assert!(work.completed_at.is_none());
}

#[tokio::test]
async fn work_ids_are_unique() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();

    let mut seen = HashSet::new();
    for _ in 0..100 {
        let id = cue.submit("task", json!({})).await.unwrap();
        assert!(seen.insert(id), "duplicate work id");
    }
}

#[tokio::test]
async fn cancel_pending_prevents_execution() {
    let cue = cue_with_api();
    let executed = Arc::new(Mutex::new(Vec::<String>::new()));
    let seen = Arc::clone(&executed);
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(move |w: WorkUnit| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(w.id.clone());
                Ok(json!({}))
            }
        }),
    ))
    .unwrap();

    // Cancel before the scheduler ever runs.
    let id = cue.submit("task", json!({})).await.unwrap();
    assert_eq!(cue.cancel(&id).await, Some(WorkState::Cancelled));
    let work = cue.get(&id).await.unwrap();
    assert_eq!(work.state, WorkState::Cancelled);
    assert!(work.completed_at.is_some());

    cue.start();
    tokio::time::sleep(Duration::from_millis(150)).await;
    cue.stop().await;

    assert!(executed.lock().unwrap().is_empty());
    assert_eq!(
        cue.get(&id).await.unwrap().state,
        WorkState::Cancelled,
        "terminal state must not change"
    );
}

#[tokio::test]
async fn submit_before_start_runs_after_start() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({"done": true})) }),
    ))
    .unwrap();

    let id = cue.submit("task", json!({})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cue.get(&id).await.unwrap().state, WorkState::Pending);

    cue.start();
    let done = wait_for(Duration::from_secs(2), || {
        let cue = &cue;
        let id = id.clone();
        async move { cue.get(&id).await.unwrap().state == WorkState::Completed }
    })
    .await;
    assert!(done);
    cue.stop().await;

    let work = cue.get(&id).await.unwrap();
    assert_eq!(work.result, Some(json!({"done": true})));
    assert!(work.started_at.is_some());
    assert!(work.completed_at.is_some());
    assert_eq!(work.attempt, 1);
}

#[tokio::test]
async fn list_filters_by_state_and_task() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "a",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();
    cue.register_task(TaskSpec::new(
        "b",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();

    for _ in 0..3 {
        cue.submit("a", json!({})).await.unwrap();
    }
    let cancelled = cue.submit("b", json!({})).await.unwrap();
    cue.cancel(&cancelled).await.unwrap();

    let all = cue.list(WorkFilter::default()).await;
    assert_eq!(all.len(), 4);

    let only_a = cue
        .list(WorkFilter {
            task: Some("a".into()),
            ..Default::default()
        })
        .await;
    assert_eq!(only_a.len(), 3);

    let pending = cue
        .list(WorkFilter {
            state: Some(WorkState::Pending),
            ..Default::default()
        })
        .await;
    assert_eq!(pending.len(), 3);

    let capped = cue
        .list(WorkFilter {
            limit: 2,
            ..Default::default()
        })
        .await;
    assert_eq!(capped.len(), 2);
}

#[tokio::test]
async fn submit_after_stop_is_rejected() {
    let cue = cue_with_api();
    cue.register_task(TaskSpec::new(
        "task",
        "api",
        HandlerFn::arc(|_w: WorkUnit| async move { Ok(json!({})) }),
    ))
    .unwrap();

    cue.start();
    cue.stop().await;

    let err = cue.submit("task", json!({})).await.unwrap_err();
    assert!(matches!(err, CueError::Shutdown));
}
