#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use chrono::Utc;
use serde_json::Value;
use tracker_core::{Job, JobStatus, StartRequest, TaskType};
use tracker_engine::{
    ApiError, JobStatusApi, JobSubmissionApi, RecentJobsApi, StartAccepted, ViewCallbacks,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

pub fn job(id: &str, status: JobStatus) -> Job {
    let mut job = Job::pending(id, TaskType::ExchangeRate, Utc::now());
    job.status = status;
    job
}

/// Lets spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Scripted API: each call pops the next queued answer.
#[derive(Default)]
pub struct MockJobsApi {
    start_answers: Mutex<VecDeque<Result<StartAccepted, ApiError>>>,
    status_answers: Mutex<VecDeque<Result<Option<Job>, ApiError>>>,
    recent_answers: Mutex<VecDeque<Result<Vec<Job>, ApiError>>>,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    recent_calls: AtomicUsize,
}

impl MockJobsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_start(&self, answer: Result<StartAccepted, ApiError>) {
        self.start_answers.lock().unwrap().push_back(answer);
    }

    pub fn answer_status(&self, answer: Result<Option<Job>, ApiError>) {
        self.status_answers.lock().unwrap().push_back(answer);
    }

    pub fn answer_recent(&self, answer: Result<Vec<Job>, ApiError>) {
        self.recent_answers.lock().unwrap().push_back(answer);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl JobSubmissionApi for MockJobsApi {
    async fn start(&self, _request: &StartRequest) -> Result<StartAccepted, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.start_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted answer".to_string())))
    }
}

#[async_trait::async_trait]
impl JobStatusApi for MockJobsApi {
    async fn get_status(&self, _job_id: &str) -> Result<Option<Job>, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

#[async_trait::async_trait]
impl RecentJobsApi for MockJobsApi {
    async fn get_recent(&self) -> Result<Vec<Job>, ApiError> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        self.recent_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Records every callback a view receives.
#[derive(Clone, Default)]
pub struct CallbackLog {
    pub completed: Arc<Mutex<Vec<Option<Value>>>>,
    pub failed: Arc<Mutex<Vec<String>>>,
}

impl CallbackLog {
    pub fn callbacks(&self) -> ViewCallbacks {
        let completed = self.completed.clone();
        let failed = self.failed.clone();
        ViewCallbacks::new()
            .on_complete(move |result| completed.lock().unwrap().push(result))
            .on_error(move |message| failed.lock().unwrap().push(message))
    }

    pub fn completed(&self) -> Vec<Option<Value>> {
        self.completed.lock().unwrap().clone()
    }

    pub fn failed(&self) -> Vec<String> {
        self.failed.lock().unwrap().clone()
    }
}
