use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{TaskId, TaskStatus, WorkerName, epoch_secs_opt};

/// Normalized view of a task as reported by the queue runtime.
///
/// All runtime-specific snapshot shapes (active, scheduled, reserved) are
/// flattened into this one form before leaving the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Unique task identifier.
    pub id: TaskId,
    /// Registered task name.
    pub name: String,
    /// Current execution state.
    pub status: TaskStatus,
    /// Worker currently holding the task, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerName>,
    /// Positional arguments the task was enqueued with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    /// When the worker started executing the task.
    #[serde(default, with = "epoch_secs_opt")]
    pub started_at: Option<SystemTime>,
    /// Earliest time the runtime will hand the task to a worker.
    #[serde(default, with = "epoch_secs_opt")]
    pub eta: Option<SystemTime>,
    /// Number of retries performed so far.
    #[serde(default)]
    pub retries: u32,
}

impl TaskInfo {
    /// Seconds the task has been running relative to `now`, if started.
    pub fn runtime_secs(&self, now: SystemTime) -> Option<u64> {
        let started = self.started_at?;
        now.duration_since(started).ok().map(|d| d.as_secs())
    }
}
