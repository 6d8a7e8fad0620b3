//! Terminal outcome reports delivered to completion observers.
//!
//! Exactly one `TaskResult` is produced per task: on success, or once the
//! retry budget is exhausted. Retried attempts are never reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal report for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: TaskId,
    pub status: TaskStatus,

    /// Wall time of the final execution only.
    pub duration_ms: u64,

    /// Executions performed, including the final one.
    pub attempts: u32,

    pub finished_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn completed(
        id: TaskId,
        duration: Duration,
        attempts: u32,
        result: serde_json::Value,
    ) -> Self {
        Self {
            id,
            status: TaskStatus::Completed,
            duration_ms: duration_millis(duration),
            attempts,
            finished_at: Utc::now(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(id: TaskId, duration: Duration, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            id,
            status: TaskStatus::Failed,
            duration_ms: duration_millis(duration),
            attempts,
            finished_at: Utc::now(),
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
