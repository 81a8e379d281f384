use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type JobId = String;

/// Lifecycle status of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Success),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task tag used to pick a result renderer. Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    #[default]
    ExchangeRate,
    Other(String),
}

impl TaskType {
    pub const EXCHANGE_RATE_TAG: &'static str = "exchange_rate";

    pub fn as_str(&self) -> &str {
        match self {
            TaskType::ExchangeRate => Self::EXCHANGE_RATE_TAG,
            TaskType::Other(tag) => tag,
        }
    }
}

impl From<String> for TaskType {
    fn from(tag: String) -> Self {
        if tag == Self::EXCHANGE_RATE_TAG {
            TaskType::ExchangeRate
        } else {
            TaskType::Other(tag)
        }
    }
}

impl From<&str> for TaskType {
    fn from(tag: &str) -> Self {
        TaskType::from(tag.to_string())
    }
}

impl From<TaskType> for String {
    fn from(task_type: TaskType) -> Self {
        match task_type {
            TaskType::ExchangeRate => TaskType::EXCHANGE_RATE_TAG.to_string(),
            TaskType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical record of one tracked job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    #[serde(default)]
    pub task_type: TaskType,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Server-assigned revision, only consulted by `MergePolicy::RejectStaleRevision`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl Job {
    /// A freshly accepted job, as synthesized right after a start call.
    pub fn pending(
        job_id: impl Into<JobId>,
        task_type: TaskType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            task_type,
            status: JobStatus::Pending,
            progress: None,
            result: None,
            error: None,
            created_at,
            revision: None,
        }
    }

    /// Shallow merge: every field present in `patch` overrides, absent fields are kept.
    pub fn merge(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(task_type) = &patch.task_type {
            self.task_type = task_type.clone();
        }
        if let Some(progress) = patch.progress {
            self.progress = Some(progress);
        }
        if let Some(result) = &patch.result {
            self.result = Some(result.clone());
        }
        if let Some(error) = &patch.error {
            self.error = Some(error.clone());
        }
        if let Some(revision) = patch.revision {
            self.revision = Some(revision);
        }
    }

    /// Progress clamped to 0..=100, rounded down for display.
    pub fn progress_percent(&self) -> Option<u8> {
        self.progress
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 100.0) as u8)
    }
}

/// Partial update for an existing job. There is no `created_at`: it never changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl JobPatch {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }
}

impl From<Job> for JobPatch {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            status: Some(job.status),
            task_type: Some(job.task_type),
            progress: job.progress,
            result: job.result,
            error: job.error,
            revision: job.revision,
        }
    }
}
