//! Per-view poll driver.
//!
//! A view observes either a specific job or whatever job is current. While the
//! observed job is `pending` or `running` the driver queries its status once per
//! interval and feeds the answer through the reducer. Independently it watches
//! every reducer application and fires the view's callbacks on the first
//! observed entry into `success` or `failed`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracker_core::{
    Action, Job, JobId, JobPatch, JobStatus, JobStore, StatusTransition, DEFAULT_JOB_ERROR,
};
use tracker_logging::{tracker_debug, tracker_warn};

use crate::api::JobStatusApi;
use crate::store::{SharedStore, StoreEvent};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Which job a view is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observe {
    Job(JobId),
    Current,
}

impl Observe {
    fn resolve<'a>(&self, store: &'a JobStore) -> Option<&'a Job> {
        match self {
            Observe::Job(job_id) => store.lookup(job_id),
            Observe::Current => store.current_job(),
        }
    }
}

pub type CompleteCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Callbacks of one observing view. Both are optional.
#[derive(Clone, Default)]
pub struct ViewCallbacks {
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
}

impl ViewCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_complete(
        mut self,
        callback: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// Spawns poll drivers sharing one store, status API and interval.
#[derive(Clone)]
pub struct PollDriver {
    store: SharedStore,
    api: Arc<dyn JobStatusApi>,
    interval: Duration,
}

impl PollDriver {
    pub fn new(store: SharedStore, api: Arc<dyn JobStatusApi>) -> Self {
        Self {
            store,
            api,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Starts observing `target` for one view. Must be called inside a tokio runtime.
    pub fn observe(&self, target: Observe, callbacks: ViewCallbacks) -> PollHandle {
        let (target_tx, target_rx) = watch::channel(target.clone());
        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicBool::new(false));
        // Subscribe before spawning so no reducer application is missed.
        let events = self.store.subscribe();

        let view = ViewState {
            target,
            callbacks,
            interval: self.interval,
            polled: None,
            last_seen: None,
            notified: HashSet::new(),
            active: active.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(run(
            view,
            self.store.clone(),
            self.api.clone(),
            events,
            target_rx,
        ));

        PollHandle {
            target_tx,
            cancel,
            active,
            task: Some(task),
        }
    }
}

/// Owned by the view. Dropping it stops the timer and silences the callbacks.
pub struct PollHandle {
    target_tx: watch::Sender<Observe>,
    cancel: CancellationToken,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Switches the view to another job; the timer restarts from scratch.
    pub fn retarget(&self, target: Observe) {
        self.target_tx.send_if_modified(|current| {
            if *current == target {
                return false;
            }
            *current = target;
            true
        });
    }

    /// True while a poll timer is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops the driver and waits for its task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ViewState {
    target: Observe,
    callbacks: ViewCallbacks,
    interval: Duration,
    /// Job the running timer belongs to.
    polled: Option<JobId>,
    /// Last status seen for the observed job, used to recover from a lagged event stream.
    last_seen: Option<(JobId, JobStatus)>,
    notified: HashSet<(JobId, JobStatus)>,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ViewState {
    /// Starts or stops the timer to match the observed job's current status.
    fn refresh(&mut self, store: &SharedStore, ticker: &mut Option<Interval>) {
        let observed = store.with_store(|store| {
            self.target
                .resolve(store)
                .map(|job| (job.job_id.clone(), job.status))
        });

        let wanted = observed
            .as_ref()
            .filter(|(_, status)| status.is_active())
            .map(|(job_id, _)| job_id.clone());

        // Only a newly observed job resets the baseline; transitions keep it current.
        if let Some((job_id, status)) = observed {
            let same_job = matches!(&self.last_seen, Some((seen, _)) if *seen == job_id);
            if !same_job {
                self.last_seen = Some((job_id, status));
            }
        }

        if wanted == self.polled && ticker.is_some() == wanted.is_some() {
            return;
        }

        match wanted {
            Some(job_id) => {
                let mut timer = interval_at(Instant::now() + self.interval, self.interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *ticker = Some(timer);
                tracker_debug!("Polling job {} every {:?}", job_id, self.interval);
                self.polled = Some(job_id);
                self.active.store(true, Ordering::Release);
            }
            None => {
                if let Some(job_id) = self.polled.take() {
                    tracker_debug!("Stopped polling job {}", job_id);
                }
                *ticker = None;
                self.active.store(false, Ordering::Release);
            }
        }
    }

    fn retarget(&mut self, target: Observe, ticker: &mut Option<Interval>) {
        tracker_debug!("View retargeted to {:?}", target);
        self.target = target;
        self.polled = None;
        self.last_seen = None;
        *ticker = None;
        self.active.store(false, Ordering::Release);
    }

    fn observed_job_id(&self, store: &SharedStore) -> Option<JobId> {
        store.with_store(|store| self.target.resolve(store).map(|job| job.job_id.clone()))
    }

    /// Transitions concern the view if they touch the job it observes now or the
    /// one it observed when the event was published (a later action may have
    /// already moved the current pointer).
    fn on_event(&mut self, store: &SharedStore, event: &StoreEvent) {
        let observed = self.observed_job_id(store);
        let previous = self.last_seen.as_ref().map(|(job_id, _)| job_id.clone());
        for transition in event.transitions.iter().filter(|transition| {
            observed.as_ref() == Some(&transition.job_id)
                || previous.as_ref() == Some(&transition.job_id)
        }) {
            self.on_transition(store, transition);
        }
    }

    /// Some events were dropped; diff against the last status we saw instead.
    fn on_lagged(&mut self, store: &SharedStore) {
        let observed = store.with_store(|store| {
            self.target
                .resolve(store)
                .map(|job| (job.job_id.clone(), job.status))
        });
        let (Some((job_id, to)), Some((seen_id, from))) = (observed, self.last_seen.clone())
        else {
            return;
        };
        if job_id == seen_id && from != to {
            let transition = StatusTransition {
                job_id,
                from: Some(from),
                to,
            };
            self.on_transition(store, &transition);
        }
    }

    fn on_transition(&mut self, store: &SharedStore, transition: &StatusTransition) {
        self.last_seen = Some((transition.job_id.clone(), transition.to));
        let status = transition.to;
        if !(transition.entered(JobStatus::Success) || transition.entered(JobStatus::Failed)) {
            return;
        }
        if !self.notified.insert((transition.job_id.clone(), status)) {
            return;
        }
        // The view is gone; its callbacks must not run.
        if self.cancel.is_cancelled() {
            return;
        }

        let job = store.with_store(|store| store.lookup(&transition.job_id).cloned());
        match status {
            JobStatus::Success => {
                if let Some(on_complete) = &self.callbacks.on_complete {
                    on_complete(job.and_then(|job| job.result));
                }
            }
            JobStatus::Failed => {
                if let Some(on_error) = &self.callbacks.on_error {
                    let message = job
                        .and_then(|job| job.error)
                        .unwrap_or_else(|| DEFAULT_JOB_ERROR.to_string());
                    on_error(message);
                }
            }
            _ => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run(
    mut view: ViewState,
    store: SharedStore,
    api: Arc<dyn JobStatusApi>,
    mut events: broadcast::Receiver<StoreEvent>,
    mut target_rx: watch::Receiver<Observe>,
) {
    let cancel = view.cancel.clone();
    let mut ticker: Option<Interval> = None;

    loop {
        view.refresh(&store, &mut ticker);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = target_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let target = target_rx.borrow_and_update().clone();
                view.retarget(target, &mut ticker);
            }
            event = events.recv() => match event {
                Ok(event) => view.on_event(&store, &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracker_warn!("Poll driver missed {} store events", skipped);
                    view.on_lagged(&store);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = next_tick(&mut ticker) => {
                let Some(job_id) = view.polled.clone() else {
                    continue;
                };
                // A query already in flight is not aborted by teardown; its answer still
                // reaches the store, only the view's callbacks are suppressed.
                match api.get_status(&job_id).await {
                    Ok(Some(job)) => {
                        store.dispatch(Action::from_report(JobPatch::from(job)));
                    }
                    Ok(None) => tracker_debug!("Status query found no job {}", job_id),
                    Err(err) => tracker_warn!("Status query for job {} failed: {}", job_id, err),
                }
            }
        }
    }

    view.active.store(false, Ordering::Release);
}
