use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Terminal outcome recorded in the task event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskOutcome {
    Success,
    Failure,
    Retry,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Failure => "failure",
            TaskOutcome::Retry => "retry",
        }
    }
}

/// Outcome counts for one task name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.succeeded += 1,
            TaskOutcome::Failure => self.failed += 1,
            TaskOutcome::Retry => self.retried += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.retried
    }
}

/// Aggregated task outcomes over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    pub window_hours: u32,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    /// Breakdown keyed by registered task name.
    pub by_task: BTreeMap<String, OutcomeCounts>,
}

impl TaskStatistics {
    /// Build the aggregate view from a per-task breakdown.
    pub fn from_breakdown(window_hours: u32, by_task: BTreeMap<String, OutcomeCounts>) -> Self {
        let mut stats = Self {
            window_hours,
            total: 0,
            succeeded: 0,
            failed: 0,
            retried: 0,
            by_task,
        };
        for counts in stats.by_task.values() {
            stats.succeeded += counts.succeeded;
            stats.failed += counts.failed;
            stats.retried += counts.retried;
        }
        stats.total = stats.succeeded + stats.failed + stats.retried;
        stats
    }
}
