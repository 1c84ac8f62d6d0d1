use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;

use orbit_model::{TaskId, TaskStatus, WorkerName};

use crate::error::MonitorError;

/// A task as the queue runtime reports it, before normalization.
///
/// The runtime uses different shapes for active, scheduled and reserved
/// snapshots; this is their union. The monitor flattens it into
/// [`orbit_model::TaskInfo`].
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub args: Option<serde_json::Value>,
    /// Set on active snapshots once a worker picked the task up.
    pub started_at: Option<SystemTime>,
    /// Set on scheduled snapshots that carry a delivery time.
    pub eta: Option<SystemTime>,
    pub retries: u32,
}

/// Control-channel view into the queue runtime.
///
/// One adapter per runtime; the monitor stays runtime-agnostic behind
/// this seam and tests drive it with a scripted fake.
#[async_trait]
pub trait QueueIntrospection: Send + Sync {
    /// Workers that answered the liveness ping.
    async fn ping_workers(&self) -> Result<Vec<WorkerName>, MonitorError>;

    /// Tasks currently executing, grouped by worker.
    async fn active(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError>;

    /// Tasks scheduled for a later delivery time, grouped by worker.
    async fn scheduled(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError>;

    /// Tasks prefetched by workers but not started, grouped by worker.
    async fn reserved(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError>;

    /// Terminal or in-flight state of one task by id, if the runtime's
    /// result backend still knows it.
    async fn task_state(&self, id: &TaskId) -> Result<Option<TaskStatus>, MonitorError>;

    /// Revoke a task; with `terminate` the worker executing it is killed.
    async fn revoke(&self, id: &TaskId, terminate: bool) -> Result<(), MonitorError>;
}
