use crate::{Job, JobPatch, JobStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Submission accepted: insert at the head and make it current.
    JobStarted(Job),
    /// Non-terminal progress for a known job.
    JobUpdated(JobPatch),
    /// Job reported `success`.
    JobCompleted(JobPatch),
    /// Job reported `failed`; also raises the store error.
    JobFailed(JobPatch),
    /// Replace the job list wholesale (recent-jobs fetch).
    JobsLoaded(Vec<Job>),
    SetCurrent(Option<Job>),
    SetLoading(bool),
    SetError(Option<String>),
    ClearError,
}

impl Action {
    /// Routes a status report to the action matching its status.
    pub fn from_report(patch: JobPatch) -> Self {
        match patch.status {
            Some(JobStatus::Success) => Action::JobCompleted(patch),
            Some(JobStatus::Failed) => Action::JobFailed(patch),
            _ => Action::JobUpdated(patch),
        }
    }

    /// Ids whose records this action may touch.
    pub fn job_ids(&self) -> Vec<&str> {
        match self {
            Action::JobStarted(job) => vec![job.job_id.as_str()],
            Action::JobUpdated(patch) | Action::JobCompleted(patch) | Action::JobFailed(patch) => {
                vec![patch.job_id.as_str()]
            }
            Action::JobsLoaded(jobs) => jobs.iter().map(|job| job.job_id.as_str()).collect(),
            Action::SetCurrent(Some(job)) => vec![job.job_id.as_str()],
            Action::SetCurrent(None)
            | Action::SetLoading(_)
            | Action::SetError(_)
            | Action::ClearError => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::JobStarted(_) => "JobStarted",
            Action::JobUpdated(_) => "JobUpdated",
            Action::JobCompleted(_) => "JobCompleted",
            Action::JobFailed(_) => "JobFailed",
            Action::JobsLoaded(_) => "JobsLoaded",
            Action::SetCurrent(_) => "SetCurrent",
            Action::SetLoading(_) => "SetLoading",
            Action::SetError(_) => "SetError",
            Action::ClearError => "ClearError",
        }
    }
}
