use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{WorkerName, epoch_secs};

/// Per-worker liveness and load snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    /// Whether the worker answered the latest introspection ping.
    pub online: bool,
    /// Tasks the worker is currently executing.
    pub active_tasks: usize,
    /// Tasks the worker has prefetched but not started.
    pub reserved_tasks: usize,
}

/// Fleet-wide worker summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOverview {
    pub workers: BTreeMap<WorkerName, WorkerStats>,
    pub total_workers: usize,
    pub online_workers: usize,
}

impl WorkerOverview {
    pub fn from_workers(workers: BTreeMap<WorkerName, WorkerStats>) -> Self {
        let total_workers = workers.len();
        let online_workers = workers.values().filter(|w| w.online).count();
        Self {
            workers,
            total_workers,
            online_workers,
        }
    }
}

/// Derived health of the worker fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Health signal derived from worker liveness and task runtimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub status: HealthStatus,
    /// Human-readable findings behind a non-healthy status.
    pub issues: Vec<String>,
    pub workers_online: usize,
    pub active_tasks: usize,
    #[serde(with = "epoch_secs")]
    pub checked_at: SystemTime,
}
