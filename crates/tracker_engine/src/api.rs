use serde::Deserialize;
use thiserror::Error;
use tracker_core::{Job, JobId, StartRequest};

/// Body of a non-2xx response, when the server sends one we can read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ErrorBody {
    /// Structured, user-facing explanation.
    #[serde(default)]
    pub detail: Option<String>,
    /// Generic message.
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("request failed with status {status}")]
    Status { status: u16, body: ErrorBody },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message shown to the user: structured detail, else the generic message, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let message = match self {
            ApiError::Status { body, .. } => body.detail.as_deref().or(body.message.as_deref()),
            ApiError::Transport(message) => Some(message.as_str()),
            ApiError::Decode(_) => None,
        };
        message
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StartAccepted {
    #[serde(rename = "jobId", alias = "job_id")]
    pub job_id: JobId,
}

#[async_trait::async_trait]
pub trait JobSubmissionApi: Send + Sync {
    async fn start(&self, request: &StartRequest) -> Result<StartAccepted, ApiError>;
}

#[async_trait::async_trait]
pub trait JobStatusApi: Send + Sync {
    /// `Ok(None)` when the server has no record of the job.
    async fn get_status(&self, job_id: &str) -> Result<Option<Job>, ApiError>;
}

#[async_trait::async_trait]
pub trait RecentJobsApi: Send + Sync {
    async fn get_recent(&self) -> Result<Vec<Job>, ApiError>;
}
