//! Job tracker engine: shared store, push/poll reconciliation and the jobs API.
mod actions;
mod api;
mod connection;
mod http;
mod poll;
mod push;
mod settings;
mod store;

pub use actions::{Clock, JobActions, RECENT_FAILED, START_FAILED, STATUS_FAILED};
pub use api::{ApiError, ErrorBody, JobStatusApi, JobSubmissionApi, RecentJobsApi, StartAccepted};
pub use connection::{
    ConnectionError, EventHandler, HandlerId, InMemoryConnection, RealtimeConnection,
    SharedConnection,
};
pub use http::HttpJobsApi;
pub use poll::{
    CompleteCallback, ErrorCallback, Observe, PollDriver, PollHandle, ViewCallbacks,
    DEFAULT_POLL_INTERVAL,
};
pub use push::{
    PushEvent, PushEventKind, PushListener, PushPayloadError, PushSubscription, DEFAULT_TOPIC,
};
pub use settings::{SettingsError, TrackerSettings};
pub use store::{SharedStore, StoreEvent};
