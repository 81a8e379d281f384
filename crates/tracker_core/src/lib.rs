//! Job tracker core: job model, pure reducer and view-model helpers.
mod action;
mod job;
mod request;
mod result;
mod state;
mod transition;
mod update;
mod view_model;

pub use action::Action;
pub use job::{Job, JobId, JobPatch, JobStatus, TaskType};
pub use request::{StartRequest, ValidationError};
pub use result::{ExchangeRateResult, TaskResult};
pub use state::{JobStore, MergePolicy};
pub use transition::{status_transitions, StatusTransition};
pub use update::{apply, DEFAULT_JOB_ERROR};
pub use view_model::{JobRowView, StoreSnapshot};
