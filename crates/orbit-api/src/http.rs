use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use orbit_model::{ActiveRateLimit, LockInfo, PipelineResult, TaskId, TaskInfo};

use crate::{error::ApiError, handler::AdminHandler};

/// Admin HTTP surface builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: AdminHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /api/v1/locks - List held locks
    /// - POST /api/v1/locks/:key/force-release - Delete a lock unconditionally
    /// - GET /api/v1/rate-limits - List active rate-limit windows
    /// - POST /api/v1/rate-limits/reset - Drop one window
    /// - POST /api/v1/refresh - Trigger a manual refresh
    /// - GET /api/v1/tasks/:id - Get task info
    /// - POST /api/v1/tasks/:id/cancel - Revoke a task
    /// - GET /api/v1/status - Comprehensive worker/task/health snapshot
    /// - GET /api/v1/statistics - Task outcome counts over a window
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/locks", get(list_locks::<H>))
            .route(
                "/api/v1/locks/{key}/force-release",
                post(force_release_lock::<H>),
            )
            .route("/api/v1/rate-limits", get(list_rate_limits::<H>))
            .route("/api/v1/rate-limits/reset", post(reset_rate_limit::<H>))
            .route("/api/v1/refresh", post(trigger_refresh::<H>))
            .route("/api/v1/tasks/{id}", get(get_task_info::<H>))
            .route("/api/v1/tasks/{id}/cancel", post(cancel_task::<H>))
            .route("/api/v1/status", get(comprehensive_status::<H>))
            .route("/api/v1/statistics", get(task_statistics::<H>))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ListLocksResponse {
    locks: BTreeMap<String, LockInfo>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForceReleaseResponse {
    key: String,
    released: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListRateLimitsResponse {
    rate_limits: Vec<ActiveRateLimit>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetRateLimitRequest {
    identifier: String,
    endpoint: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetRateLimitResponse {
    reset: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TriggerRefreshRequest {
    /// Restrict the fetch stage to these sources; empty means all.
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GetTaskInfoResponse {
    info: TaskInfo,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    /// Also kill the worker process executing the task.
    #[serde(default)]
    terminate: bool,
}

#[derive(Debug, Deserialize)]
struct StatisticsParams {
    /// Trailing window in hours (default 24, max one week).
    window_hours: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/locks
async fn list_locks<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    let locks = handler.list_locks().await?;
    debug!(count = locks.len(), "locks listed");

    let response = ListLocksResponse {
        total: locks.len(),
        locks,
    };
    Ok(Json(response))
}

/// POST /api/v1/locks/:key/force-release
async fn force_release_lock<H>(
    State(handler): State<Arc<H>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    if key.trim().is_empty() {
        return Err(ApiError::InvalidRequest("lock key cannot be empty".into()));
    }

    let released = handler.force_release_lock(&key).await?;
    debug!(key, released, "lock force-release requested");

    Ok(Json(ForceReleaseResponse { key, released }))
}

/// GET /api/v1/rate-limits
async fn list_rate_limits<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    let rate_limits = handler.list_rate_limits().await?;

    let response = ListRateLimitsResponse {
        total: rate_limits.len(),
        rate_limits,
    };
    Ok(Json(response))
}

/// POST /api/v1/rate-limits/reset
async fn reset_rate_limit<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<ResetRateLimitRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    if req.identifier.trim().is_empty() || req.endpoint.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "identifier and endpoint are required".into(),
        ));
    }

    let reset = handler
        .reset_rate_limit(&req.identifier, &req.endpoint)
        .await?;
    debug!(
        identifier = %req.identifier,
        endpoint = %req.endpoint,
        reset,
        "rate limit reset requested"
    );

    Ok(Json(ResetRateLimitResponse { reset }))
}

/// POST /api/v1/refresh
async fn trigger_refresh<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<TriggerRefreshRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    debug!(sources = ?req.sources, "manual refresh requested");
    let result: PipelineResult = handler.trigger_manual_refresh(req.sources).await?;

    Ok((axum::http::StatusCode::ACCEPTED, Json(result)))
}

/// GET /api/v1/tasks/:id
async fn get_task_info<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    let task_id = TaskId::from(id);
    let info = handler.get_task_info(&task_id).await?;

    Ok(Json(GetTaskInfoResponse { info }))
}

/// POST /api/v1/tasks/:id/cancel
async fn cancel_task<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
    Query(params): Query<CancelParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    if id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("task_id cannot be empty".into()));
    }

    let task_id = TaskId::from(id);
    let ack = handler.cancel_task(&task_id, params.terminate).await?;
    debug!(%task_id, terminate = params.terminate, "task cancel requested");

    Ok(Json(ack))
}

/// GET /api/v1/status
async fn comprehensive_status<H>(
    State(handler): State<Arc<H>>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    let status = handler.get_comprehensive_status().await?;
    Ok(Json(status))
}

/// GET /api/v1/statistics
///
/// Query params:
/// - ?window_hours=24 - trailing window (default 24, max 168)
async fn task_statistics<H>(
    State(handler): State<Arc<H>>,
    Query(params): Query<StatisticsParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: AdminHandler,
{
    let window_hours = params.window_hours.unwrap_or(24);
    if window_hours == 0 || window_hours > 168 {
        return Err(ApiError::InvalidRequest(
            "window_hours must be between 1 and 168".into(),
        ));
    }

    let stats = handler.get_task_statistics(window_hours).await?;
    Ok(Json(stats))
}
