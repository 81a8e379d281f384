//! Push-channel listener: turns named real-time events into reducer actions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracker_core::{Action, Job, JobPatch, JobStatus, TaskType};
use tracker_logging::{tracker_debug, tracker_info, tracker_trace, tracker_warn};

use crate::connection::{ConnectionError, EventHandler, HandlerId, SharedConnection};
use crate::store::SharedStore;

/// Topic the scraping service publishes job events on.
pub const DEFAULT_TOPIC: &str = "scraping";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEventKind {
    Started,
    Progress,
    Completed,
    Failed,
}

impl PushEventKind {
    pub const ALL: [PushEventKind; 4] = [
        PushEventKind::Started,
        PushEventKind::Progress,
        PushEventKind::Completed,
        PushEventKind::Failed,
    ];

    /// Event name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            PushEventKind::Started => "started",
            PushEventKind::Progress => "progress",
            PushEventKind::Completed => "completed",
            PushEventKind::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushPayloadError {
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("payload has no jobId")]
    MissingJobId,
    #[error("payload has no status")]
    MissingStatus,
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
    #[error("field {field} has an unexpected type")]
    InvalidField { field: &'static str },
}

/// A validated push event. Task-specific fields not understood here stay in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub patch: JobPatch,
    pub created_at: Option<DateTime<Utc>>,
    pub extra: Map<String, Value>,
}

impl PushEvent {
    pub fn parse(kind: PushEventKind, payload: &Value) -> Result<Self, PushPayloadError> {
        let mut fields = payload
            .as_object()
            .cloned()
            .ok_or(PushPayloadError::NotAnObject)?;

        let job_id = match fields.remove("jobId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::Null) | None => return Err(PushPayloadError::MissingJobId),
            Some(_) => return Err(PushPayloadError::InvalidField { field: "jobId" }),
        };
        let status = match fields.remove("status") {
            Some(Value::String(raw)) => {
                JobStatus::parse(&raw).ok_or(PushPayloadError::UnknownStatus(raw))?
            }
            Some(Value::Null) | None => return Err(PushPayloadError::MissingStatus),
            Some(_) => return Err(PushPayloadError::InvalidField { field: "status" }),
        };

        let mut patch = JobPatch::new(job_id).with_status(status);
        patch.task_type = take_string(&mut fields, "taskType")?.map(TaskType::from);
        patch.progress = match fields.remove("progress") {
            Some(Value::Number(value)) => value.as_f64(),
            Some(Value::Null) | None => None,
            Some(_) => return Err(PushPayloadError::InvalidField { field: "progress" }),
        };
        patch.result = fields.remove("result").filter(|value| !value.is_null());
        patch.error = take_string(&mut fields, "error")?;
        patch.revision = match fields.remove("revision") {
            Some(Value::Number(value)) => value.as_u64(),
            Some(Value::Null) | None => None,
            Some(_) => return Err(PushPayloadError::InvalidField { field: "revision" }),
        };
        let created_at = take_string(&mut fields, "createdAt")?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|stamp| stamp.with_timezone(&Utc));

        Ok(Self {
            kind,
            patch,
            created_at,
            extra: fields,
        })
    }

    /// The reducer action for this event. `now` stamps jobs first seen via `started`.
    pub fn into_action(self, now: DateTime<Utc>) -> Action {
        match self.kind {
            PushEventKind::Started => {
                let patch = self.patch;
                let mut job = Job::pending(
                    patch.job_id.clone(),
                    patch.task_type.clone().unwrap_or_default(),
                    self.created_at.unwrap_or(now),
                );
                job.merge(&patch);
                Action::JobStarted(job)
            }
            PushEventKind::Progress => Action::JobUpdated(self.patch),
            PushEventKind::Completed => Action::JobCompleted(self.patch),
            PushEventKind::Failed => Action::JobFailed(self.patch),
        }
    }
}

fn take_string(
    fields: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, PushPayloadError> {
    match fields.remove(field) {
        Some(Value::String(value)) => Ok(Some(value)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(PushPayloadError::InvalidField { field }),
    }
}

#[derive(Default)]
struct Registration {
    observers: usize,
    handlers: Vec<(PushEventKind, HandlerId)>,
}

struct ListenerInner {
    connection: SharedConnection,
    store: SharedStore,
    topic: String,
    registration: Mutex<Registration>,
}

impl ListenerInner {
    fn registration(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn handler_for(&self, kind: PushEventKind) -> EventHandler {
        let store = self.store.clone();
        Arc::new(move |payload: &Value| {
            tracker_trace!("push {} payload {}", kind.name(), payload);
            match PushEvent::parse(kind, payload) {
                Ok(event) => {
                    tracker_debug!("push {} for job {}", kind.name(), event.patch.job_id);
                    store.dispatch(event.into_action(Utc::now()));
                }
                Err(err) => {
                    tracker_warn!("Dropping invalid {} push payload: {}", kind.name(), err)
                }
            }
        })
    }

    fn detach(&self) {
        let mut registration = self.registration();
        registration.observers = registration.observers.saturating_sub(1);
        if registration.observers > 0 {
            return;
        }
        for (kind, handler) in registration.handlers.drain(..) {
            // `off` for a handler the transport already forgot is a no-op.
            self.connection.off(kind.name(), handler);
        }
        self.connection.leave(&self.topic);
        tracker_info!("Push listener detached from topic {}", self.topic);
    }
}

/// Keeps the store in sync with push events while at least one observer is attached.
#[derive(Clone)]
pub struct PushListener {
    inner: Arc<ListenerInner>,
}

impl PushListener {
    pub fn new(connection: SharedConnection, store: SharedStore, topic: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                connection,
                store,
                topic: topic.into(),
                registration: Mutex::new(Registration::default()),
            }),
        }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn observers(&self) -> usize {
        self.inner.registration().observers
    }

    /// Attaches an observer. The first one connects, joins the topic and registers
    /// the four event handlers; dropping the last subscription undoes that.
    pub async fn activate(&self) -> Result<PushSubscription, ConnectionError> {
        self.inner.connection.ensure_connected().await?;

        let mut registration = self.inner.registration();
        registration.observers += 1;
        if registration.observers == 1 {
            self.inner.connection.join(&self.inner.topic);
            for kind in PushEventKind::ALL {
                let handler = self
                    .inner
                    .connection
                    .on(kind.name(), self.inner.handler_for(kind));
                registration.handlers.push((kind, handler));
            }
            tracker_info!("Push listener attached to topic {}", self.inner.topic);
        }
        drop(registration);

        Ok(PushSubscription {
            inner: Some(self.inner.clone()),
        })
    }
}

/// Observer guard returned by [`PushListener::activate`].
pub struct PushSubscription {
    inner: Option<Arc<ListenerInner>>,
}

impl PushSubscription {
    /// Detaches now instead of at drop.
    pub fn release(mut self) {
        if let Some(inner) = self.inner.take() {
            inner.detach();
        }
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.detach();
        }
    }
}
