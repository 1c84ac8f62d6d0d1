use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use orbit_model::{
    HealthStatus, SystemHealth, TaskId, TaskInfo, TaskStatus, WorkerName, WorkerOverview,
    WorkerStats,
};

use crate::error::MonitorError;
use crate::introspection::{QueueIntrospection, TaskSnapshot};

/// A task running longer than this is reported as stuck.
const STUCK_TASK_THRESHOLD: Duration = Duration::from_secs(7_200);

/// How a cancellation was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelStatus {
    /// The task was revoked; a worker already executing it finishes.
    Revoked,
    /// The task was revoked and the executing worker process was killed.
    Terminated,
}

/// Acknowledgement returned by [`TaskMonitor::cancel_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAck {
    pub task_id: TaskId,
    pub status: CancelStatus,
}

/// Everything an operator dashboard needs in one read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveStatus {
    pub workers: WorkerOverview,
    pub active_tasks: Vec<TaskInfo>,
    pub scheduled_tasks: Vec<TaskInfo>,
    pub reserved_tasks: Vec<TaskInfo>,
    pub system_health: SystemHealth,
}

/// Read-only aggregation over the queue runtime's introspection channel.
pub struct TaskMonitor {
    queue: Arc<dyn QueueIntrospection>,
    stuck_threshold: Duration,
}

impl TaskMonitor {
    pub fn new(queue: Arc<dyn QueueIntrospection>) -> Self {
        Self {
            queue,
            stuck_threshold: STUCK_TASK_THRESHOLD,
        }
    }

    /// Override the stuck-task heuristic threshold.
    pub fn with_stuck_threshold(mut self, stuck_threshold: Duration) -> Self {
        self.stuck_threshold = stuck_threshold;
        self
    }

    fn normalize(
        grouped: BTreeMap<WorkerName, Vec<TaskSnapshot>>,
        status: TaskStatus,
    ) -> Vec<TaskInfo> {
        let mut tasks = Vec::new();
        for (worker, snapshots) in grouped {
            for snap in snapshots {
                tasks.push(TaskInfo {
                    id: snap.id,
                    name: snap.name,
                    status,
                    worker: Some(worker.clone()),
                    args: snap.args,
                    started_at: snap.started_at,
                    eta: snap.eta,
                    retries: snap.retries,
                });
            }
        }
        tasks
    }

    pub async fn get_active_tasks(&self) -> Result<Vec<TaskInfo>, MonitorError> {
        Ok(Self::normalize(self.queue.active().await?, TaskStatus::Started))
    }

    pub async fn get_scheduled_tasks(&self) -> Result<Vec<TaskInfo>, MonitorError> {
        Ok(Self::normalize(
            self.queue.scheduled().await?,
            TaskStatus::Pending,
        ))
    }

    pub async fn get_reserved_tasks(&self) -> Result<Vec<TaskInfo>, MonitorError> {
        Ok(Self::normalize(
            self.queue.reserved().await?,
            TaskStatus::Pending,
        ))
    }

    /// Per-worker liveness and load, merged from ping and snapshots.
    ///
    /// A worker appears when it answered the ping or holds tasks; a
    /// worker holding tasks without answering is reported offline.
    pub async fn get_worker_stats(&self) -> Result<WorkerOverview, MonitorError> {
        let online = self.queue.ping_workers().await?;
        let active = self.queue.active().await?;
        let reserved = self.queue.reserved().await?;

        let mut workers: BTreeMap<WorkerName, WorkerStats> = BTreeMap::new();
        for name in &online {
            workers.entry(name.clone()).or_insert_with(|| WorkerStats {
                online: true,
                active_tasks: 0,
                reserved_tasks: 0,
            });
        }
        for (name, tasks) in &active {
            workers
                .entry(name.clone())
                .or_insert_with(|| WorkerStats {
                    online: false,
                    active_tasks: 0,
                    reserved_tasks: 0,
                })
                .active_tasks = tasks.len();
        }
        for (name, tasks) in &reserved {
            workers
                .entry(name.clone())
                .or_insert_with(|| WorkerStats {
                    online: false,
                    active_tasks: 0,
                    reserved_tasks: 0,
                })
                .reserved_tasks = tasks.len();
        }

        Ok(WorkerOverview::from_workers(workers))
    }

    /// One merged snapshot of tasks, workers and derived health.
    pub async fn get_comprehensive_status(&self) -> Result<ComprehensiveStatus, MonitorError> {
        let workers = self.get_worker_stats().await?;
        let active_tasks = self.get_active_tasks().await?;
        let scheduled_tasks = self.get_scheduled_tasks().await?;
        let reserved_tasks = self.get_reserved_tasks().await?;
        let system_health = self.derive_health(&workers, &active_tasks, SystemTime::now());

        Ok(ComprehensiveStatus {
            workers,
            active_tasks,
            scheduled_tasks,
            reserved_tasks,
            system_health,
        })
    }

    fn derive_health(
        &self,
        workers: &WorkerOverview,
        active: &[TaskInfo],
        now: SystemTime,
    ) -> SystemHealth {
        let mut issues = Vec::new();

        if workers.online_workers == 0 {
            issues.push("no workers online".to_string());
        }
        for task in active {
            match task.runtime_secs(now) {
                Some(runtime) if runtime > self.stuck_threshold.as_secs() => {
                    issues.push(format!(
                        "task {} ({}) running for {runtime}s",
                        task.id, task.name
                    ));
                }
                _ => {}
            }
        }

        let status = if workers.online_workers == 0 {
            HealthStatus::Critical
        } else if issues.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Warning
        };
        if status != HealthStatus::Healthy {
            warn!(?status, issues = issues.len(), "fleet health degraded");
        }

        SystemHealth {
            status,
            issues,
            workers_online: workers.online_workers,
            active_tasks: active.len(),
            checked_at: now,
        }
    }

    /// Look a task up across all snapshots, falling back to the result
    /// backend for tasks no worker currently holds.
    pub async fn get_task_info(&self, id: &TaskId) -> Result<TaskInfo, MonitorError> {
        let snapshots = [
            (self.queue.active().await?, TaskStatus::Started),
            (self.queue.scheduled().await?, TaskStatus::Pending),
            (self.queue.reserved().await?, TaskStatus::Pending),
        ];
        for (grouped, status) in snapshots {
            if let Some(task) = Self::normalize(grouped, status)
                .into_iter()
                .find(|t| &t.id == id)
            {
                return Ok(task);
            }
        }

        match self.queue.task_state(id).await? {
            Some(status) => Ok(TaskInfo {
                id: id.clone(),
                name: "unknown".to_string(),
                status,
                worker: None,
                args: None,
                started_at: None,
                eta: None,
                retries: 0,
            }),
            None => Err(MonitorError::TaskNotFound(id.clone())),
        }
    }

    /// Revoke a task; `terminate` additionally kills the worker process
    /// currently executing it.
    pub async fn cancel_task(
        &self,
        id: &TaskId,
        terminate: bool,
    ) -> Result<CancelAck, MonitorError> {
        self.queue.revoke(id, terminate).await?;
        let status = if terminate {
            CancelStatus::Terminated
        } else {
            CancelStatus::Revoked
        };
        info!(task_id = %id, ?status, "task cancelled");
        Ok(CancelAck {
            task_id: id.clone(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    /// Scripted runtime: snapshots are set up per test.
    #[derive(Default)]
    struct FakeQueue {
        online: Vec<WorkerName>,
        active: BTreeMap<WorkerName, Vec<TaskSnapshot>>,
        scheduled: BTreeMap<WorkerName, Vec<TaskSnapshot>>,
        reserved: BTreeMap<WorkerName, Vec<TaskSnapshot>>,
        states: BTreeMap<TaskId, TaskStatus>,
        revoked: Mutex<Vec<(TaskId, bool)>>,
    }

    #[async_trait]
    impl QueueIntrospection for FakeQueue {
        async fn ping_workers(&self) -> Result<Vec<WorkerName>, MonitorError> {
            Ok(self.online.clone())
        }

        async fn active(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
            Ok(self.active.clone())
        }

        async fn scheduled(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
            Ok(self.scheduled.clone())
        }

        async fn reserved(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
            Ok(self.reserved.clone())
        }

        async fn task_state(&self, id: &TaskId) -> Result<Option<TaskStatus>, MonitorError> {
            Ok(self.states.get(id).copied())
        }

        async fn revoke(&self, id: &TaskId, terminate: bool) -> Result<(), MonitorError> {
            self.revoked.lock().unwrap().push((id.clone(), terminate));
            Ok(())
        }
    }

    fn snapshot(id: &str, name: &str, started_secs_ago: Option<u64>) -> TaskSnapshot {
        TaskSnapshot {
            id: TaskId::from(id),
            name: name.to_string(),
            args: None,
            started_at: started_secs_ago.map(|s| SystemTime::now() - Duration::from_secs(s)),
            eta: None,
            retries: 0,
        }
    }

    #[tokio::test]
    async fn active_snapshots_normalize_with_worker_and_status() {
        let mut queue = FakeQueue::default();
        queue.active.insert(
            "worker-1@host".to_string(),
            vec![snapshot("t-1", "refresh.scrape_launch_data", Some(30))],
        );

        let monitor = TaskMonitor::new(Arc::new(queue));
        let tasks = monitor.get_active_tasks().await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Started);
        assert_eq!(tasks[0].worker.as_deref(), Some("worker-1@host"));
        assert!(tasks[0].started_at.is_some());
    }

    #[tokio::test]
    async fn worker_stats_merge_ping_with_task_counts() {
        let mut queue = FakeQueue::default();
        queue.online = vec!["worker-1@host".to_string()];
        queue.active.insert(
            "worker-1@host".to_string(),
            vec![
                snapshot("t-1", "refresh.scrape_launch_data", Some(10)),
                snapshot("t-2", "maintenance.rotate_logs", Some(5)),
            ],
        );
        // Holds a prefetched task but did not answer the ping.
        queue.reserved.insert(
            "worker-2@host".to_string(),
            vec![snapshot("t-3", "refresh.scrape_launch_data", None)],
        );

        let monitor = TaskMonitor::new(Arc::new(queue));
        let overview = monitor.get_worker_stats().await.unwrap();

        assert_eq!(overview.total_workers, 2);
        assert_eq!(overview.online_workers, 1);
        assert_eq!(overview.workers["worker-1@host"].active_tasks, 2);
        assert!(!overview.workers["worker-2@host"].online);
        assert_eq!(overview.workers["worker-2@host"].reserved_tasks, 1);
    }

    #[tokio::test]
    async fn no_workers_online_is_critical() {
        let monitor = TaskMonitor::new(Arc::new(FakeQueue::default()));
        let status = monitor.get_comprehensive_status().await.unwrap();

        assert_eq!(status.system_health.status, HealthStatus::Critical);
        assert!(status.system_health.issues[0].contains("no workers online"));
    }

    #[tokio::test]
    async fn long_running_task_is_a_warning() {
        let mut queue = FakeQueue::default();
        queue.online = vec!["worker-1@host".to_string()];
        queue.active.insert(
            "worker-1@host".to_string(),
            vec![snapshot("t-1", "refresh.scrape_launch_data", Some(8_000))],
        );

        let monitor = TaskMonitor::new(Arc::new(queue));
        let status = monitor.get_comprehensive_status().await.unwrap();

        assert_eq!(status.system_health.status, HealthStatus::Warning);
        assert!(status.system_health.issues[0].contains("t-1"));
    }

    #[tokio::test]
    async fn healthy_fleet_reports_no_issues() {
        let mut queue = FakeQueue::default();
        queue.online = vec!["worker-1@host".to_string()];
        queue.active.insert(
            "worker-1@host".to_string(),
            vec![snapshot("t-1", "refresh.scrape_launch_data", Some(60))],
        );

        let monitor = TaskMonitor::new(Arc::new(queue));
        let status = monitor.get_comprehensive_status().await.unwrap();

        assert_eq!(status.system_health.status, HealthStatus::Healthy);
        assert!(status.system_health.issues.is_empty());
        assert_eq!(status.system_health.active_tasks, 1);
    }

    #[tokio::test]
    async fn task_lookup_falls_back_to_the_result_backend() {
        let mut queue = FakeQueue::default();
        queue.reserved.insert(
            "worker-1@host".to_string(),
            vec![snapshot("t-1", "refresh.scrape_launch_data", None)],
        );
        queue.states.insert(TaskId::from("t-done"), TaskStatus::Success);

        let monitor = TaskMonitor::new(Arc::new(queue));

        let held = monitor.get_task_info(&TaskId::from("t-1")).await.unwrap();
        assert_eq!(held.status, TaskStatus::Pending);
        assert_eq!(held.name, "refresh.scrape_launch_data");

        let finished = monitor.get_task_info(&TaskId::from("t-done")).await.unwrap();
        assert_eq!(finished.status, TaskStatus::Success);
        assert!(finished.worker.is_none());

        let missing = monitor.get_task_info(&TaskId::from("t-gone")).await;
        assert!(matches!(missing, Err(MonitorError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn cancel_forwards_the_terminate_flag() {
        let queue = Arc::new(FakeQueue::default());
        let monitor = TaskMonitor::new(queue.clone());

        let ack = monitor
            .cancel_task(&TaskId::from("t-1"), false)
            .await
            .unwrap();
        assert_eq!(ack.status, CancelStatus::Revoked);

        let ack = monitor
            .cancel_task(&TaskId::from("t-2"), true)
            .await
            .unwrap();
        assert_eq!(ack.status, CancelStatus::Terminated);

        let revoked = queue.revoked.lock().unwrap();
        assert_eq!(revoked.len(), 2);
        assert_eq!(revoked[0], (TaskId::from("t-1"), false));
        assert_eq!(revoked[1], (TaskId::from("t-2"), true));
    }
}
