use crate::{Job, JobId, JobStatus, TaskResult, TaskType};

/// Read-only copy of the store handed to the display layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreSnapshot {
    pub jobs: Vec<Job>,
    pub current_job: Option<Job>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreSnapshot {
    pub fn rows(&self) -> Vec<JobRowView> {
        self.jobs.iter().map(JobRowView::from_job).collect()
    }

    pub fn current_row(&self) -> Option<JobRowView> {
        self.current_job.as_ref().map(JobRowView::from_job)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub task_type: TaskType,
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub summary: Option<String>,
}

impl JobRowView {
    pub fn from_job(job: &Job) -> Self {
        let summary = match job.status {
            JobStatus::Failed => job.error.clone(),
            _ => TaskResult::select(&job.task_type, job.result.as_ref())
                .map(|result| result.summary()),
        };
        Self {
            job_id: job.job_id.clone(),
            task_type: job.task_type.clone(),
            status: job.status,
            progress: job.progress_percent(),
            summary,
        }
    }
}
