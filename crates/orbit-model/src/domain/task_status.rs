use serde::{Deserialize, Serialize};

/// Execution state of a queue-runtime task.
///
/// Mirrors the states the queue runtime reports through its introspection
/// interface; this core never drives the transitions itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Task is queued or scheduled and has not started yet.
    Pending,
    /// Task is currently executing on a worker.
    Started,
    /// Task completed successfully.
    Success,
    /// Task failed and will not be retried further.
    Failure,
    /// Task failed and a retry has been scheduled.
    Retry,
    /// Task was revoked before or during execution.
    Revoked,
}

impl TaskStatus {
    /// Returns `true` if the task will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Revoked
        )
    }

    /// Returns `true` if the task is waiting or running.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Started)
    }
}
