use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use tracker_engine::TrackerSettings;
use tracker_logging::LogDestination;

/// Track scraping jobs against a jobs API.
#[derive(Parser, Debug)]
#[command(name = "job-tracker", version, about, long_about = None)]
pub struct Cli {
    /// RON settings file. A missing file means built-in defaults.
    #[arg(long, default_value = "tracker.ron")]
    pub config: PathBuf,

    /// Overrides `api_base_url` from the settings file.
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Overrides `poll_interval_ms` from the settings file.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Also write logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Keep logs off the terminal. With `--log-file` they only go to the file.
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit a new exchange-rate scrape.
    Start {
        url: String,
        currency_pair: String,
        /// Spreadsheet that should receive the result.
        #[arg(long)]
        target_sheet_id: Option<String>,
        /// Keep running until the job finishes.
        #[arg(long)]
        watch: bool,
    },
    /// Show the current status of one job.
    Status { job_id: String },
    /// List recent jobs, newest first.
    Recent,
    /// Follow one job until it reaches a terminal status.
    Watch { job_id: String },
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// Where logs go, or `None` when logging is off.
    pub fn log_destination(&self) -> Option<LogDestination> {
        match (&self.log_file, self.quiet) {
            (Some(path), true) => Some(LogDestination::File(path.clone())),
            (Some(path), false) => Some(LogDestination::Both(path.clone())),
            (None, true) => None,
            (None, false) => Some(LogDestination::Terminal),
        }
    }

    /// Settings file merged with command-line overrides.
    pub fn settings(&self) -> anyhow::Result<TrackerSettings> {
        let mut settings = TrackerSettings::load_or_default(&self.config)
            .with_context(|| format!("loading settings from {}", self.config.display()))?;
        if let Some(url) = &self.api_base_url {
            settings.api_base_url = url.clone();
        }
        if let Some(interval) = self.poll_interval_ms {
            settings.poll_interval_ms = interval;
        }
        Ok(settings)
    }
}
