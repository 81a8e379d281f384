use serde::{Deserialize, Serialize};

use crate::view_model::StoreSnapshot;
use crate::{Job, JobPatch, JobStatus};

/// How conflicting updates from push and poll are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Whatever is applied last wins, field by field.
    #[default]
    LastAppliedWins,
    /// Drop patches carrying a revision lower than the stored one.
    RejectStaleRevision,
}

/// Canonical job store. Only mutated through [`crate::apply`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobStore {
    jobs: Vec<Job>,
    current_job: Option<Job>,
    loading: bool,
    error: Option<String>,
    policy: MergePolicy,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn current_job(&self) -> Option<&Job> {
        self.current_job.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }

    /// Best known record for `job_id`: the list entry, else the current job.
    pub fn lookup(&self, job_id: &str) -> Option<&Job> {
        self.job(job_id).or_else(|| {
            self.current_job
                .as_ref()
                .filter(|job| job.job_id == job_id)
        })
    }

    pub fn status_of(&self, job_id: &str) -> Option<JobStatus> {
        self.lookup(job_id).map(|job| job.status)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            jobs: self.jobs.clone(),
            current_job: self.current_job.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    pub(crate) fn start_job(&mut self, mut job: Job) {
        if let Some(existing) = self.lookup(&job.job_id) {
            job.created_at = existing.created_at;
        }
        self.jobs.retain(|existing| existing.job_id != job.job_id);
        self.jobs.insert(0, job.clone());
        self.current_job = Some(job);
        self.loading = false;
    }

    /// Returns true when at least one record was merged.
    pub(crate) fn merge_patch(&mut self, patch: &JobPatch) -> bool {
        let policy = self.policy;
        let mut merged = false;
        for job in self
            .jobs
            .iter_mut()
            .chain(self.current_job.iter_mut())
            .filter(|job| job.job_id == patch.job_id)
        {
            if accepts(policy, job, patch) {
                job.merge(patch);
                merged = true;
            }
        }
        merged
    }

    pub(crate) fn load_jobs(&mut self, jobs: Vec<Job>) {
        let mut loaded: Vec<Job> = Vec::with_capacity(jobs.len());
        for job in jobs {
            if !loaded.iter().any(|seen| seen.job_id == job.job_id) {
                loaded.push(job);
            }
        }
        self.jobs = loaded;
        self.loading = false;
    }

    pub(crate) fn set_current(&mut self, job: Option<Job>) {
        self.current_job = job;
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

fn accepts(policy: MergePolicy, job: &Job, patch: &JobPatch) -> bool {
    match (policy, job.revision, patch.revision) {
        (MergePolicy::RejectStaleRevision, Some(stored), Some(incoming)) => incoming >= stored,
        _ => true,
    }
}
