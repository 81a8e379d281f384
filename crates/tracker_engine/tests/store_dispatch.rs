mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use support::{init_logging, job};
use tracker_core::{Action, JobPatch, JobStatus, JobStore, MergePolicy, StatusTransition};
use tracker_engine::{
    InMemoryConnection, PushListener, SharedConnection, SharedStore, StoreEvent,
};

#[tokio::test]
async fn every_dispatch_bumps_the_version_and_publishes() {
    init_logging();
    let store = SharedStore::default();
    let mut events = store.subscribe();

    assert_eq!(store.version(), 0);
    store.dispatch(Action::JobStarted(job("J1", JobStatus::Pending)));
    store.dispatch(Action::SetLoading(true));
    let version = store.dispatch(Action::JobUpdated(
        JobPatch::new("J1").with_status(JobStatus::Running),
    ));
    assert_eq!(version, 3);
    assert_eq!(store.version(), 3);

    assert_eq!(
        events.recv().await.unwrap(),
        StoreEvent {
            version: 1,
            transitions: vec![StatusTransition {
                job_id: "J1".to_string(),
                from: None,
                to: JobStatus::Pending,
            }],
        }
    );
    assert_eq!(events.recv().await.unwrap().transitions, vec![]);
    assert_eq!(
        events.recv().await.unwrap().transitions,
        vec![StatusTransition {
            job_id: "J1".to_string(),
            from: Some(JobStatus::Pending),
            to: JobStatus::Running,
        }]
    );
}

#[test]
fn dispatch_without_subscribers_still_applies() {
    init_logging();
    let store = SharedStore::new(JobStore::with_policy(MergePolicy::RejectStaleRevision));
    let mut started = job("J1", JobStatus::Running);
    started.revision = Some(4);
    store.dispatch(Action::JobStarted(started));

    store.dispatch(Action::JobUpdated(
        JobPatch::new("J1").with_progress(10.0).with_revision(3),
    ));
    store.dispatch(Action::JobCompleted(
        JobPatch::new("J1")
            .with_status(JobStatus::Success)
            .with_result(json!({"rate": 2}))
            .with_revision(5),
    ));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.jobs[0].progress, None);
    assert_eq!(snapshot.jobs[0].status, JobStatus::Success);
    assert_eq!(snapshot.jobs[0].revision, Some(5));
    assert_eq!(store.with_store(|store| store.policy()), MergePolicy::RejectStaleRevision);
}

#[tokio::test]
async fn disconnect_drops_topics_and_delivery() {
    init_logging();
    let transport = Arc::new(InMemoryConnection::new());
    let connection = SharedConnection::new(transport.clone());
    let store = SharedStore::default();
    let listener = PushListener::new(connection.clone(), store.clone(), "rates");
    assert_eq!(listener.topic(), "rates");

    let subscription = listener.activate().await.unwrap();
    assert!(connection.is_connected());
    connection.disconnect();
    assert!(!connection.is_connected());
    assert_eq!(connection.joiners("rates"), 0);
    assert_eq!(
        transport.emit("rates", "started", &json!({"jobId": "J1", "status": "pending"})),
        0
    );

    // Detaching after a disconnect only deregisters handlers.
    drop(subscription);
    assert_eq!(transport.handler_count("started"), 0);
    assert!(store.snapshot().jobs.is_empty());
}
