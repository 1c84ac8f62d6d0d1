use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use orbit_model::{OutcomeCounts, TaskId, TaskOutcome, TaskStatistics};
use orbit_store::{CoordinationStore, keys};

use crate::error::MonitorError;

/// Events older than this are trimmed and the key expires with them.
const RETENTION: Duration = Duration::from_secs(7 * 24 * 3_600);

/// One terminal task outcome, stored as a JSON member of the event set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskEvent {
    /// Random per-event id; identical outcomes in the same second must
    /// remain distinct set members.
    id: String,
    task_id: TaskId,
    task_name: String,
    outcome: TaskOutcome,
}

fn real_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Durable log of terminal task outcomes, kept in the coordination store
/// as an ordered set scored by completion time.
///
/// Workers append on task completion; [`Self::get_task_statistics`] folds
/// the trailing window into per-task-name counts.
pub struct TaskEventLog {
    store: Arc<dyn CoordinationStore>,
    clock: fn() -> f64,
}

impl TaskEventLog {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            clock: real_now_secs,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    /// Append one terminal outcome.
    pub async fn record(
        &self,
        task_id: &TaskId,
        task_name: &str,
        outcome: TaskOutcome,
    ) -> Result<(), MonitorError> {
        let event = TaskEvent {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.clone(),
            task_name: task_name.to_string(),
            outcome,
        };
        let member = serde_json::to_string(&event)
            .map_err(|e| MonitorError::Queue(format!("event encoding failed: {e}")))?;

        let now = (self.clock)();
        self.store
            .zadd(keys::TASK_EVENTS_KEY, &member, now)
            .await?;
        self.store.expire(keys::TASK_EVENTS_KEY, RETENTION).await?;
        debug!(task_id = %task_id, task_name, outcome = outcome.as_str(), "task event recorded");
        Ok(())
    }

    /// Outcome counts per task name over the trailing `window_hours`.
    pub async fn get_task_statistics(
        &self,
        window_hours: u32,
    ) -> Result<TaskStatistics, MonitorError> {
        let now = (self.clock)();

        // Trim expired history while we are here; the count is unused.
        self.store
            .zwindow_count(keys::TASK_EVENTS_KEY, now - RETENTION.as_secs_f64())
            .await?;

        let cutoff = now - f64::from(window_hours) * 3_600.0;
        let mut by_task: std::collections::BTreeMap<String, OutcomeCounts> = Default::default();
        for (member, score) in self.store.zrange_all(keys::TASK_EVENTS_KEY).await? {
            if score <= cutoff {
                continue;
            }
            let event: TaskEvent = match serde_json::from_str(&member) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "skipping undecodable task event");
                    continue;
                }
            };
            by_task
                .entry(event.task_name)
                .or_default()
                .record(event.outcome);
        }

        Ok(TaskStatistics::from_breakdown(window_hours, by_task))
    }
}
