use crate::{Action, JobStore};

/// Store error used when a failure report carries no message.
pub const DEFAULT_JOB_ERROR: &str = "Job failed";

/// Pure reducer: applies an action to the store and returns the next store.
pub fn apply(mut store: JobStore, action: Action) -> JobStore {
    match action {
        Action::JobStarted(job) => store.start_job(job),
        Action::JobUpdated(patch) | Action::JobCompleted(patch) => {
            // Updates for unknown ids are dropped: only JobStarted inserts.
            store.merge_patch(&patch);
        }
        Action::JobFailed(patch) => {
            store.merge_patch(&patch);
            let message = patch
                .error
                .unwrap_or_else(|| DEFAULT_JOB_ERROR.to_string());
            store.set_error(Some(message));
        }
        Action::JobsLoaded(jobs) => store.load_jobs(jobs),
        Action::SetCurrent(job) => store.set_current(job),
        Action::SetLoading(loading) => store.set_loading(loading),
        Action::SetError(error) => store.set_error(error),
        Action::ClearError => store.set_error(None),
    }
    store
}
