use crate::{Action, JobId, JobStatus, JobStore};

/// A job's status as seen immediately before and after one reducer application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub job_id: JobId,
    /// `None` when the job was unknown before the action.
    pub from: Option<JobStatus>,
    pub to: JobStatus,
}

impl StatusTransition {
    /// True when a previously seen job entered `status` on this application.
    pub fn entered(&self, status: JobStatus) -> bool {
        self.to == status && self.from.is_some_and(|from| from != status)
    }
}

/// Status changes caused by `action`, comparing `before` against `after`.
pub fn status_transitions(
    before: &JobStore,
    after: &JobStore,
    action: &Action,
) -> Vec<StatusTransition> {
    let mut transitions: Vec<StatusTransition> = Vec::new();
    for job_id in action.job_ids() {
        if transitions.iter().any(|seen| seen.job_id == job_id) {
            continue;
        }
        let Some(to) = after.status_of(job_id) else {
            continue;
        };
        let from = before.status_of(job_id);
        if from != Some(to) {
            transitions.push(StatusTransition {
                job_id: job_id.to_string(),
                from,
                to,
            });
        }
    }
    transitions
}
