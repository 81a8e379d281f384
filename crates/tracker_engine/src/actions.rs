use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracker_core::{Action, Job, JobId, JobPatch, StartRequest, TaskType};
use tracker_logging::{tracker_info, tracker_warn};

use crate::api::{ApiError, JobStatusApi, JobSubmissionApi, RecentJobsApi};
use crate::store::SharedStore;

pub const START_FAILED: &str = "Failed to start job";
pub const STATUS_FAILED: &str = "Failed to fetch job status";
pub const RECENT_FAILED: &str = "Failed to fetch recent jobs";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clears `loading` when dropped, so every exit path (including a cancelled
/// future) leaves the store idle.
struct LoadingGuard<'a> {
    store: &'a SharedStore,
}

impl<'a> LoadingGuard<'a> {
    fn begin(store: &'a SharedStore) -> Self {
        store.dispatch(Action::SetLoading(true));
        store.dispatch(Action::ClearError);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.dispatch(Action::SetLoading(false));
    }
}

/// Request initiators invoked by the display layer.
pub struct JobActions<A> {
    store: SharedStore,
    api: Arc<A>,
    clock: Clock,
}

impl<A> Clone for JobActions<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            api: self.api.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<A> JobActions<A>
where
    A: JobSubmissionApi + JobStatusApi + RecentJobsApi,
{
    pub fn new(store: SharedStore, api: Arc<A>) -> Self {
        Self {
            store,
            api,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the clock used to stamp newly started jobs.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Submits a scrape. On failure the store error is set and the error is returned too.
    pub async fn start_job(&self, request: &StartRequest) -> Result<JobId, ApiError> {
        let _loading = LoadingGuard::begin(&self.store);
        match self.api.start(request).await {
            Ok(accepted) => {
                tracker_info!(
                    "Started job {} for {} ({})",
                    accepted.job_id,
                    request.url(),
                    request.currency_pair()
                );
                let job = Job::pending(
                    accepted.job_id.clone(),
                    TaskType::ExchangeRate,
                    (self.clock)(),
                );
                self.store.dispatch(Action::JobStarted(job));
                Ok(accepted.job_id)
            }
            Err(err) => {
                tracker_warn!("Start request for {} failed: {}", request.url(), err);
                self.store
                    .dispatch(Action::SetError(Some(err.user_message(START_FAILED))));
                Err(err)
            }
        }
    }

    /// Refreshes one job. Unknown jobs are ignored; failures only land in the store error.
    pub async fn get_status(&self, job_id: &str) {
        let _loading = LoadingGuard::begin(&self.store);
        match self.api.get_status(job_id).await {
            Ok(Some(job)) => {
                self.store
                    .dispatch(Action::from_report(JobPatch::from(job)));
            }
            Ok(None) => {}
            Err(err) => {
                tracker_warn!("Status request for job {} failed: {}", job_id, err);
                self.store
                    .dispatch(Action::SetError(Some(err.user_message(STATUS_FAILED))));
            }
        }
    }

    /// Fetches one job and makes sure the store can answer for it afterwards: a
    /// known job is refreshed like [`JobActions::get_status`], an unknown one is
    /// adopted as the current job. Returns false when the server has no such job
    /// or the query failed (the store error says which).
    pub async fn open_job(&self, job_id: &str) -> bool {
        let _loading = LoadingGuard::begin(&self.store);
        match self.api.get_status(job_id).await {
            Ok(Some(job)) => {
                let known = self.store.with_store(|store| store.lookup(job_id).is_some());
                if known {
                    self.store
                        .dispatch(Action::from_report(JobPatch::from(job)));
                } else {
                    tracker_info!("Opened job {} ({})", job.job_id, job.status);
                    self.store.dispatch(Action::SetCurrent(Some(job)));
                }
                true
            }
            Ok(None) => false,
            Err(err) => {
                tracker_warn!("Status request for job {} failed: {}", job_id, err);
                self.store
                    .dispatch(Action::SetError(Some(err.user_message(STATUS_FAILED))));
                false
            }
        }
    }

    /// Reloads the recent-jobs list. Failures only land in the store error.
    pub async fn get_recent(&self) {
        let _loading = LoadingGuard::begin(&self.store);
        match self.api.get_recent().await {
            Ok(jobs) => {
                tracker_info!("Loaded {} recent jobs", jobs.len());
                self.store.dispatch(Action::JobsLoaded(jobs));
            }
            Err(err) => {
                tracker_warn!("Recent jobs request failed: {}", err);
                self.store
                    .dispatch(Action::SetError(Some(err.user_message(RECENT_FAILED))));
            }
        }
    }

    pub fn clear_current(&self) {
        self.store.dispatch(Action::SetCurrent(None));
    }
}
