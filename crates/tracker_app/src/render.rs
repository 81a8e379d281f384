//! Plain-text rendering of store snapshots.

use serde_json::Value;
use tracker_core::{JobRowView, JobStatus, TaskResult, TaskType};

const ID_WIDTH: usize = 12;
const STATUS_WIDTH: usize = 9;

pub fn format_row(row: &JobRowView) -> String {
    let progress = match (row.status, row.progress) {
        (JobStatus::Running, Some(percent)) => format!("{percent:>3}%"),
        _ => "    ".to_string(),
    };
    let mut line = format!(
        "{:<ID_WIDTH$} {:<STATUS_WIDTH$} {} {}",
        row.job_id,
        row.status.as_str(),
        progress,
        row.task_type
    );
    if let Some(summary) = &row.summary {
        line.push_str("  ");
        line.push_str(summary);
    }
    line.trim_end().to_string()
}

pub fn format_table(rows: &[JobRowView]) -> String {
    if rows.is_empty() {
        return "no recent jobs".to_string();
    }
    rows.iter().map(format_row).collect::<Vec<_>>().join("\n")
}

/// Final line for a watched job that completed.
pub fn format_completion(job_id: &str, task_type: &TaskType, result: Option<&Value>) -> String {
    match TaskResult::select(task_type, result) {
        Some(result) => format!("{job_id} finished: {}", result.summary()),
        None => format!("{job_id} finished"),
    }
}

pub fn format_failure(job_id: &str, message: &str) -> String {
    format!("{job_id} failed: {message}")
}
