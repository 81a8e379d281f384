use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TaskType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateResult {
    pub currency_pair: String,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Result payload interpreted according to the job's task tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    ExchangeRate(ExchangeRateResult),
    Generic(Value),
}

impl TaskResult {
    /// Picks the renderer for `task_type`. Anything not understood falls back to `Generic`.
    pub fn select(task_type: &TaskType, payload: Option<&Value>) -> Option<Self> {
        let payload = payload?;
        let selected = match task_type {
            TaskType::ExchangeRate => {
                match serde_json::from_value::<ExchangeRateResult>(payload.clone()) {
                    Ok(rate) => TaskResult::ExchangeRate(rate),
                    Err(_) => TaskResult::Generic(payload.clone()),
                }
            }
            TaskType::Other(_) => TaskResult::Generic(payload.clone()),
        };
        Some(selected)
    }

    /// One-line human readable summary.
    pub fn summary(&self) -> String {
        match self {
            TaskResult::ExchangeRate(rate) => match &rate.source {
                Some(source) => format!("{} = {} ({})", rate.currency_pair, rate.rate, source),
                None => format!("{} = {}", rate.currency_pair, rate.rate),
            },
            TaskResult::Generic(Value::String(text)) => text.clone(),
            TaskResult::Generic(value) => value.to_string(),
        }
    }
}
