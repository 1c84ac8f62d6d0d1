use std::collections::BTreeMap;

use async_trait::async_trait;

use orbit_model::{ActiveRateLimit, LockInfo, PipelineResult, TaskId, TaskInfo, TaskStatistics};
use orbit_monitor::{CancelAck, ComprehensiveStatus};

use crate::error::ApiError;

/// Operator-facing admin surface.
///
/// This trait abstracts the backend implementation; the provided
/// [`crate::CoordinationAdapter`] delegates straight to the coordination
/// components, and custom handlers can wrap it with auth or audit logic.
#[async_trait]
pub trait AdminHandler: Send + Sync + 'static {
    /// Snapshot every currently held lock.
    async fn list_locks(&self) -> Result<BTreeMap<String, LockInfo>, ApiError>;

    /// Delete a lock regardless of ownership. Returns whether it existed.
    async fn force_release_lock(&self, key: &str) -> Result<bool, ApiError>;

    /// Enumerate active rate-limit windows.
    async fn list_rate_limits(&self) -> Result<Vec<ActiveRateLimit>, ApiError>;

    /// Drop one rate-limit window. Returns whether it existed.
    async fn reset_rate_limit(&self, identifier: &str, endpoint: &str) -> Result<bool, ApiError>;

    /// Run the pipeline immediately, optionally restricted to sources.
    async fn trigger_manual_refresh(
        &self,
        sources: Option<Vec<String>>,
    ) -> Result<PipelineResult, ApiError>;

    /// Look one task up by id.
    async fn get_task_info(&self, id: &TaskId) -> Result<TaskInfo, ApiError>;

    /// Revoke a task, optionally killing its worker process.
    async fn cancel_task(&self, id: &TaskId, terminate: bool) -> Result<CancelAck, ApiError>;

    /// Merged worker / task / health snapshot.
    async fn get_comprehensive_status(&self) -> Result<ComprehensiveStatus, ApiError>;

    /// Task outcome counts over a trailing window.
    async fn get_task_statistics(&self, window_hours: u32) -> Result<TaskStatistics, ApiError>;
}
