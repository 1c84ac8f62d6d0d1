use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use orbit_limit::RateLimiter;
use orbit_lock::LockManager;
use orbit_model::{ActiveRateLimit, LockInfo, PipelineResult, TaskId, TaskInfo, TaskStatistics};
use orbit_monitor::{CancelAck, ComprehensiveStatus, TaskEventLog, TaskMonitor};
use orbit_pipeline::PipelineOrchestrator;

use crate::error::ApiError;
use crate::handler::AdminHandler;

/// Ready-to-use [`AdminHandler`] that delegates to the coordination
/// components directly.
pub struct CoordinationAdapter {
    locks: Arc<LockManager>,
    limiter: Arc<RateLimiter>,
    orchestrator: Arc<PipelineOrchestrator>,
    monitor: Arc<TaskMonitor>,
    events: Arc<TaskEventLog>,
}

impl CoordinationAdapter {
    pub fn new(
        locks: Arc<LockManager>,
        limiter: Arc<RateLimiter>,
        orchestrator: Arc<PipelineOrchestrator>,
        monitor: Arc<TaskMonitor>,
        events: Arc<TaskEventLog>,
    ) -> Self {
        Self {
            locks,
            limiter,
            orchestrator,
            monitor,
            events,
        }
    }
}

#[async_trait]
impl AdminHandler for CoordinationAdapter {
    async fn list_locks(&self) -> Result<BTreeMap<String, LockInfo>, ApiError> {
        Ok(self.locks.list_locks(None).await?)
    }

    async fn force_release_lock(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.locks.force_release(key).await?)
    }

    async fn list_rate_limits(&self) -> Result<Vec<ActiveRateLimit>, ApiError> {
        Ok(self.limiter.list_active().await)
    }

    async fn reset_rate_limit(&self, identifier: &str, endpoint: &str) -> Result<bool, ApiError> {
        Ok(self.limiter.reset(identifier, endpoint).await)
    }

    async fn trigger_manual_refresh(
        &self,
        sources: Option<Vec<String>>,
    ) -> Result<PipelineResult, ApiError> {
        Ok(self.orchestrator.run_manual_refresh(sources).await)
    }

    async fn get_task_info(&self, id: &TaskId) -> Result<TaskInfo, ApiError> {
        Ok(self.monitor.get_task_info(id).await?)
    }

    async fn cancel_task(&self, id: &TaskId, terminate: bool) -> Result<CancelAck, ApiError> {
        Ok(self.monitor.cancel_task(id, terminate).await?)
    }

    async fn get_comprehensive_status(&self) -> Result<ComprehensiveStatus, ApiError> {
        Ok(self.monitor.get_comprehensive_status().await?)
    }

    async fn get_task_statistics(&self, window_hours: u32) -> Result<TaskStatistics, ApiError> {
        Ok(self.events.get_task_statistics(window_hours).await?)
    }
}
