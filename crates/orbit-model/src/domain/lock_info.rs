use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::epoch_secs_opt;

/// Diagnostic view of a held lock.
///
/// The store is the only authority for lock state; this snapshot can be
/// stale by the time it is read and must not be used for ownership checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    /// Owner token currently stored under the key.
    pub token: String,
    /// Remaining TTL in seconds; negative when the store reports no expiry.
    pub ttl_seconds: i64,
    /// Absolute expiry instant, when a positive TTL is known.
    #[serde(default, with = "epoch_secs_opt")]
    pub expires_at: Option<SystemTime>,
}
