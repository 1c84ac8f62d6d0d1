use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::epoch_secs;

/// A record as fetched from one source, before validation.
///
/// The payload stays opaque JSON here; interpreting it is the transform
/// collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Name of the source the record came from.
    pub source: String,
    /// When the source was read.
    #[serde(with = "epoch_secs")]
    pub fetched_at: SystemTime,
    /// Source-shaped record body.
    pub payload: serde_json::Value,
}

/// A validated, deduplicated record ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    /// Stable natural key; the persist stage upserts by this slug.
    pub slug: String,
    /// Reconciled record body.
    pub payload: serde_json::Value,
}
