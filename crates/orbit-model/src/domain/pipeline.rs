use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{epoch_secs, epoch_secs_opt};

/// Terminal status of one orchestrated refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    /// All three stages ran and persistence committed.
    Success,
    /// The fleet lock was held elsewhere; no stage was invoked.
    Skipped,
    /// The fetch stage returned zero records; later stages not invoked.
    NoData,
    /// The transform stage yielded zero processed records.
    ProcessingFailed,
    /// A stage failed unexpectedly.
    Failed,
}

impl PipelineStatus {
    /// Statuses that are legitimate outcomes rather than faults.
    ///
    /// These must never trigger a queue-runtime retry.
    pub fn is_expected(&self) -> bool {
        !matches!(self, PipelineStatus::Failed)
    }
}

/// Per-source fetch outcome; a cycle tolerates partial source failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutcome {
    pub source: String,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of the fetch stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSummary {
    pub sources: Vec<SourceOutcome>,
    /// Total records fetched across all sources.
    pub records: usize,
    pub duration_secs: f64,
}

/// Summary of the transform stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSummary {
    /// Records that survived validation, dedup and reconciliation.
    pub processed: usize,
    /// Records dropped as invalid or duplicate.
    pub dropped: usize,
    /// Cross-source value conflicts detected while reconciling.
    pub conflicts: usize,
    pub duration_secs: f64,
}

/// Summary of the persist stage (idempotent upsert by slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSummary {
    pub created: usize,
    pub updated: usize,
    pub total: usize,
    pub duration_secs: f64,
}

/// Merged per-cycle statistics, assembled after the last stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatistics {
    pub duration_secs: f64,
    pub fetch_ok: bool,
    pub transform_ok: bool,
    pub persist_ok: bool,
    pub records_fetched: usize,
    pub records_processed: usize,
    pub conflicts_detected: usize,
    pub records_created: usize,
    pub records_updated: usize,
}

/// Immutable result of one orchestrator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub status: PipelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist: Option<PersistSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<PipelineStatistics>,
    #[serde(with = "epoch_secs")]
    pub started_at: SystemTime,
    #[serde(default, with = "epoch_secs_opt")]
    pub finished_at: Option<SystemTime>,
    /// Last error message for a failed cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Marks a failed cycle the queue adapter may re-enqueue.
    ///
    /// Expected terminal statuses keep this `false`; only unexpected
    /// stage failures are eligible for retry.
    #[serde(default)]
    pub retryable: bool,
}

impl PipelineResult {
    fn bare(status: PipelineStatus, started_at: SystemTime) -> Self {
        Self {
            status,
            fetch: None,
            transform: None,
            persist: None,
            statistics: None,
            started_at,
            finished_at: None,
            error: None,
            retryable: false,
        }
    }

    /// Cycle skipped because the fleet lock was held by another worker.
    pub fn skipped(started_at: SystemTime, holder: impl Into<String>) -> Self {
        let mut r = Self::bare(PipelineStatus::Skipped, started_at);
        r.error = Some(format!("another refresh cycle holds the lock ({})", holder.into()));
        r.finished_at = Some(started_at);
        r
    }

    /// Cycle ended early because no source returned records.
    pub fn no_data(started_at: SystemTime, fetch: FetchSummary, finished_at: SystemTime) -> Self {
        let mut r = Self::bare(PipelineStatus::NoData, started_at);
        r.fetch = Some(fetch);
        r.finished_at = Some(finished_at);
        r
    }

    /// Cycle ended early because transform produced nothing usable.
    pub fn processing_failed(
        started_at: SystemTime,
        fetch: FetchSummary,
        transform: TransformSummary,
        finished_at: SystemTime,
    ) -> Self {
        let mut r = Self::bare(PipelineStatus::ProcessingFailed, started_at);
        r.fetch = Some(fetch);
        r.transform = Some(transform);
        r.finished_at = Some(finished_at);
        r
    }

    /// Unexpected stage failure; `retryable` requests a runtime retry.
    pub fn failed(
        started_at: SystemTime,
        error: impl Into<String>,
        retryable: bool,
        finished_at: SystemTime,
    ) -> Self {
        let mut r = Self::bare(PipelineStatus::Failed, started_at);
        r.error = Some(error.into());
        r.retryable = retryable;
        r.finished_at = Some(finished_at);
        r
    }
}
