//! End-to-end flows across initiators, push listener and poll driver.

mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use support::{init_logging, job, settle, CallbackLog, MockJobsApi};
use tracker_core::{Action, JobStatus, JobStore, StartRequest, TaskResult};
use tracker_engine::{
    ApiError, InMemoryConnection, JobActions, Observe, PollDriver, PushListener, SharedConnection,
    SharedStore, StartAccepted, DEFAULT_TOPIC,
};

fn request() -> StartRequest {
    StartRequest::new("https://rates.example.com/btc", "BTC/USD", None).unwrap()
}

#[tokio::test(start_paused = true)]
async fn started_job_becomes_current_and_head_of_list() {
    init_logging();
    let api = Arc::new(MockJobsApi::new());
    api.answer_start(Ok(StartAccepted {
        job_id: "J1".to_string(),
    }));
    let store = SharedStore::new(JobStore::new());
    store.dispatch(Action::JobsLoaded(vec![job("J0", JobStatus::Success)]));
    let actions = JobActions::new(store.clone(), api.clone());

    actions.start_job(&request()).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.jobs[0].job_id, "J1");
    assert_eq!(snapshot.jobs[0].status, JobStatus::Pending);
    assert_eq!(snapshot.jobs.len(), 2);
    assert_eq!(snapshot.current_job.unwrap().job_id, "J1");
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn pushed_completion_reaches_store_and_view_once() {
    init_logging();
    let api = Arc::new(MockJobsApi::new());
    let store = SharedStore::new(JobStore::new());
    store.dispatch(Action::JobStarted(job("J1", JobStatus::Running)));

    let transport = Arc::new(InMemoryConnection::new());
    let listener = PushListener::new(
        SharedConnection::new(transport.clone()),
        store.clone(),
        DEFAULT_TOPIC,
    );
    let _push = listener.activate().await.unwrap();
    let log = CallbackLog::default();
    let view = PollDriver::new(store.clone(), api.clone()).observe(Observe::Current, log.callbacks());
    settle().await;

    let payload = json!({
        "jobId": "J1",
        "status": "success",
        "result": {"currency_pair": "BTC/USD", "rate": 67000},
    });
    transport.emit(DEFAULT_TOPIC, "completed", &payload);
    settle().await;
    // A duplicate delivery must not fire the callback again.
    transport.emit(DEFAULT_TOPIC, "completed", &payload);
    settle().await;

    let snapshot = store.snapshot();
    let current = snapshot.current_job.clone().unwrap();
    assert_eq!(current.status, JobStatus::Success);
    match TaskResult::select(&current.task_type, current.result.as_ref()) {
        Some(TaskResult::ExchangeRate(rate)) => {
            assert_eq!(rate.currency_pair, "BTC/USD");
            assert_eq!(rate.rate, 67000.0);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(snapshot.jobs[0].status, JobStatus::Success);
    assert_eq!(
        log.completed(),
        vec![Some(json!({"currency_pair": "BTC/USD", "rate": 67000}))]
    );
    assert!(!view.is_active());
    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn recent_jobs_keep_server_order_and_current() {
    init_logging();
    let api = Arc::new(MockJobsApi::new());
    api.answer_recent(Ok(vec![
        job("A", JobStatus::Success),
        job("B", JobStatus::Running),
        job("C", JobStatus::Failed),
    ]));
    let store = SharedStore::new(JobStore::new());
    store.dispatch(Action::JobStarted(job("X", JobStatus::Running)));
    let actions = JobActions::new(store.clone(), api.clone());

    actions.get_recent().await;

    let snapshot = store.snapshot();
    let ids: Vec<&str> = snapshot.jobs.iter().map(|job| job.job_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(snapshot.current_job.unwrap().job_id, "X");
}

#[tokio::test(start_paused = true)]
async fn rejected_start_surfaces_the_transport_message() {
    init_logging();
    let api = Arc::new(MockJobsApi::new());
    api.answer_start(Err(ApiError::Transport("rate limited".to_string())));
    let store = SharedStore::new(JobStore::new());
    let actions = JobActions::new(store.clone(), api.clone());

    let err = actions.start_job(&request()).await.unwrap_err();

    assert_eq!(err, ApiError::Transport("rate limited".to_string()));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("rate limited"));
    assert!(!snapshot.loading);
    assert!(snapshot.jobs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn poll_and_push_race_converges() {
    init_logging();
    let api = Arc::new(MockJobsApi::new());
    let store = SharedStore::new(JobStore::new());
    store.dispatch(Action::JobStarted(job("J1", JobStatus::Running)));

    let transport = Arc::new(InMemoryConnection::new());
    let listener = PushListener::new(
        SharedConnection::new(transport.clone()),
        store.clone(),
        DEFAULT_TOPIC,
    );
    let _push = listener.activate().await.unwrap();

    // The poll reports an older progress after push already delivered a newer one.
    let mut stale = job("J1", JobStatus::Running);
    stale.progress = Some(10.0);
    api.answer_status(Ok(Some(stale)));
    let log = CallbackLog::default();
    let _view = PollDriver::new(store.clone(), api.clone())
        .observe(Observe::Job("J1".into()), log.callbacks());
    settle().await;

    transport.emit(
        DEFAULT_TOPIC,
        "progress",
        &json!({"jobId": "J1", "status": "running", "progress": 60}),
    );
    tokio::time::advance(tracker_engine::DEFAULT_POLL_INTERVAL).await;
    settle().await;
    // Last applied wins under the default policy.
    assert_eq!(store.snapshot().jobs[0].progress, Some(10.0));

    transport.emit(
        DEFAULT_TOPIC,
        "completed",
        &json!({"jobId": "J1", "status": "success", "result": {"rate": 1}}),
    );
    settle().await;
    assert_eq!(store.snapshot().jobs[0].status, JobStatus::Success);
    assert_eq!(log.completed().len(), 1);
}
