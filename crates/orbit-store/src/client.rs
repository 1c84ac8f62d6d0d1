use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Commands the coordination core needs from a Redis-compatible store.
///
/// This trait is the seam between the lock manager / rate limiter / event
/// log and the actual store. Production uses [`crate::RedisStore`]; tests
/// and local development use [`crate::MemoryStore`]. Implementations must
/// make the compare-and-* operations atomic at the store, not client-side.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Conditional write: set `key = value` with expiry `ttl` only if the
    /// key does not exist. Returns whether the write happened.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional delete. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically delete `key` only if its value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Atomically add `additional` to the remaining TTL of `key` only if
    /// its value equals `expected` and a positive TTL remains.
    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        additional: Duration,
    ) -> Result<bool, StoreError>;

    /// Remaining TTL in seconds. `None` when the key does not exist;
    /// `Some(-1)` when it exists without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Refresh the expiry of an existing key. Returns whether it existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Keys matching a glob-style pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Atomic sliding-window round trip for the rate limiter: drop entries
    /// scored at or below `cutoff`, count the survivors, speculatively add
    /// `member` at `score`, refresh the key expiry to `expiry`. Returns the
    /// survivor count *before* the speculative add.
    async fn zwindow_consume(
        &self,
        key: &str,
        cutoff: f64,
        member: &str,
        score: f64,
        expiry: Duration,
    ) -> Result<u64, StoreError>;

    /// Read-only variant of [`Self::zwindow_consume`]: trim then count.
    async fn zwindow_count(&self, key: &str, cutoff: f64) -> Result<u64, StoreError>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    /// The lowest-scored member, if any.
    async fn zrange_oldest(&self, key: &str) -> Result<Option<(String, f64)>, StoreError>;

    /// All members with scores, ordered ascending by score.
    async fn zrange_all(&self, key: &str) -> Result<Vec<(String, f64)>, StoreError>;
}
