use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracker_core::{JobRowView, JobStatus, JobStore, StartRequest};
use tracker_engine::{
    HttpJobsApi, InMemoryConnection, JobActions, Observe, PollDriver, PushListener,
    SharedConnection, SharedStore, TrackerSettings, ViewCallbacks,
};
use tracker_logging::{tracker_debug, tracker_error, tracker_info};

use crate::cli::Command;
use crate::render;

/// Everything a command needs, wired against one store.
struct Session {
    settings: TrackerSettings,
    store: SharedStore,
    api: Arc<HttpJobsApi>,
    actions: JobActions<HttpJobsApi>,
}

impl Session {
    fn new(settings: TrackerSettings) -> anyhow::Result<Self> {
        let api = Arc::new(
            HttpJobsApi::new(&settings).map_err(|err| anyhow!("invalid api settings: {err}"))?,
        );
        let store = SharedStore::new(JobStore::with_policy(settings.merge_policy));
        let actions = JobActions::new(store.clone(), api.clone());
        Ok(Self {
            settings,
            store,
            api,
            actions,
        })
    }

    fn store_error(&self) -> Option<String> {
        self.store.snapshot().error
    }

    fn row(&self, job_id: &str) -> Option<JobRowView> {
        self.store
            .with_store(|store| store.lookup(job_id).map(JobRowView::from_job))
    }

    /// Loads `job_id` into the store, failing with the store error or "no job".
    async fn open(&self, job_id: &str) -> anyhow::Result<()> {
        if self.actions.open_job(job_id).await {
            return Ok(());
        }
        match self.store_error() {
            Some(message) => bail!(message),
            None => bail!("no job with id {job_id}"),
        }
    }
}

pub async fn run(
    command: Command,
    settings: TrackerSettings,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let session = Session::new(settings)?;
    match command {
        Command::Start {
            url,
            currency_pair,
            target_sheet_id,
            watch: follow,
        } => {
            let request = StartRequest::new(&url, &currency_pair, target_sheet_id.as_deref())
                .context("invalid start request")?;
            let job_id = match session.actions.start_job(&request).await {
                Ok(job_id) => job_id,
                Err(err) => {
                    let message = session.store_error().unwrap_or_else(|| err.to_string());
                    bail!("could not start job: {message}");
                }
            };
            writeln!(out, "started {job_id}")?;
            if follow {
                watch(&session, &job_id, out).await?;
            }
        }
        Command::Status { job_id } => {
            session.open(&job_id).await?;
            if let Some(row) = session.row(&job_id) {
                writeln!(out, "{}", render::format_row(&row))?;
            }
        }
        Command::Recent => {
            session.actions.get_recent().await;
            if let Some(message) = session.store_error() {
                bail!(message);
            }
            writeln!(
                out,
                "{}",
                render::format_table(&session.store.snapshot().rows())
            )?;
        }
        Command::Watch { job_id } => {
            session.open(&job_id).await?;
            watch(&session, &job_id, out).await?;
        }
    }
    Ok(())
}

enum Outcome {
    Completed(Option<Value>),
    Failed(String),
    Cancelled,
}

/// Follows `job_id` through push and poll until it settles.
async fn watch(session: &Session, job_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let status = session.store.with_store(|store| store.status_of(job_id));
    if let Some(status) = status.filter(|status| status.is_terminal()) {
        tracker_debug!("Job {} already {}", job_id, status);
        print_changed(session, job_id, &mut None, out)?;
        return Ok(());
    }

    // No push transport is configured for the CLI, so the local connection stays quiet
    // and polling carries the updates.
    let connection = SharedConnection::new(Arc::new(InMemoryConnection::new()));
    let listener = PushListener::new(connection, session.store.clone(), &session.settings.topic);
    let _push = listener
        .activate()
        .await
        .context("attaching push listener")?;

    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();
    let failed_tx = outcome_tx.clone();
    let callbacks = ViewCallbacks::new()
        .on_complete(move |result| {
            let _ = outcome_tx.send(Outcome::Completed(result));
        })
        .on_error(move |message| {
            let _ = failed_tx.send(Outcome::Failed(message));
        });
    let mut events = session.store.subscribe();
    let view = PollDriver::new(session.store.clone(), session.api.clone())
        .with_interval(session.settings.poll_interval())
        .observe(Observe::Job(job_id.to_string()), callbacks);
    tracker_info!("Watching job {}", job_id);

    let mut shown = None;
    print_changed(session, job_id, &mut shown, out)?;
    let outcome = loop {
        tokio::select! {
            Some(outcome) = outcomes.recv() => break outcome,
            event = events.recv() => match event {
                Ok(event) => {
                    let cancelled = event
                        .transitions
                        .iter()
                        .any(|t| t.job_id == job_id && t.to == JobStatus::Cancelled);
                    if cancelled {
                        break Outcome::Cancelled;
                    }
                    print_changed(session, job_id, &mut shown, out)?;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    print_changed(session, job_id, &mut shown, out)?;
                }
                Err(broadcast::error::RecvError::Closed) => break Outcome::Cancelled,
            },
        }
    };
    view.shutdown().await;

    let task_type = session
        .store
        .with_store(|store| store.lookup(job_id).map(|job| job.task_type.clone()))
        .unwrap_or_default();
    match outcome {
        Outcome::Completed(result) => {
            writeln!(
                out,
                "{}",
                render::format_completion(job_id, &task_type, result.as_ref())
            )?;
            Ok(())
        }
        Outcome::Failed(message) => {
            tracker_error!("Job {} failed: {}", job_id, message);
            bail!(render::format_failure(job_id, &message))
        }
        Outcome::Cancelled => {
            writeln!(out, "{job_id} was cancelled")?;
            Ok(())
        }
    }
}

/// Prints the job's row unless it matches the one printed last.
fn print_changed(
    session: &Session,
    job_id: &str,
    shown: &mut Option<JobRowView>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let row = session.row(job_id);
    if row.is_some() && row != *shown {
        if let Some(current) = &row {
            writeln!(out, "{}", render::format_row(current))?;
        }
        *shown = row;
    }
    Ok(())
}
