use thiserror::Error;

use orbit_store::StoreError;

#[derive(Debug, Error)]
pub enum LockError {
    /// Another owner holds the key; carries its token and remaining TTL
    /// for diagnostics.
    #[error("lock {key} is busy: held by {holder} for another {ttl_seconds}s")]
    Busy {
        key: String,
        holder: String,
        ttl_seconds: i64,
    },

    /// The stored token no longer matches, typically because the TTL
    /// expired and another owner reacquired the key.
    #[error("lock {key} lost: owner token no longer matches")]
    Lost { key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
