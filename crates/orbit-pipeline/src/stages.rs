use async_trait::async_trait;

use orbit_model::{ProcessedRecord, RawRecord};

use crate::error::StageError;

/// One upstream source of raw records.
///
/// A cycle fans out over every registered fetcher; a failing source is
/// recorded per-source and does not abort the fetch stage on its own.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Stable source name, used for per-source reporting and for
    /// restricting manual refreshes.
    fn name(&self) -> &str;

    /// Retrieve the source's current records. `force_refresh` asks the
    /// fetcher to bypass any freshness shortcuts it keeps internally.
    async fn fetch(&self, force_refresh: bool) -> Result<Vec<RawRecord>, StageError>;
}

/// Validation, deduplication and cross-source reconciliation.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, records: Vec<RawRecord>) -> Result<TransformOutput, StageError>;
}

#[derive(Debug)]
pub struct TransformOutput {
    pub records: Vec<ProcessedRecord>,
    /// Records rejected as invalid or duplicate.
    pub dropped: usize,
    /// Cross-source value conflicts resolved during reconciliation.
    pub conflicts: usize,
}

/// Idempotent upsert of processed records, keyed by slug.
///
/// Re-invoking with the same input must converge instead of duplicating
/// rows; retried cycles rely on this rather than on rollback.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, records: Vec<ProcessedRecord>) -> Result<PersistOutput, StageError>;
}

#[derive(Debug)]
pub struct PersistOutput {
    pub created: usize,
    pub updated: usize,
}
