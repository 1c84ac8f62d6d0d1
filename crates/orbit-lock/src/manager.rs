use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use orbit_model::LockInfo;
use orbit_store::{CoordinationStore, StoreError, keys};

use crate::error::LockError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Proof of ownership handed out by [`LockManager::acquire`].
///
/// The guard is just the (key, token) pair; dropping it does nothing.
/// Callers must release explicitly (or let the TTL reclaim the key) so
/// that release stays an observable, fallible operation.
#[derive(Debug, Clone)]
pub struct LockGuard {
    key: String,
    token: String,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token stored under the key for the lifetime of the lease.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// TTL-leased exclusive locks on named resources, mediated entirely by
/// the coordination store.
///
/// No in-process state is authoritative: a key either holds exactly one
/// owner token or does not exist. Release and extension verify ownership
/// server-side in the same atomic step as the mutation.
pub struct LockManager {
    store: Arc<dyn CoordinationStore>,
    poll_interval: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the retry interval used while waiting for a busy lock.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Try to acquire `key` with expiry `ttl`, polling until
    /// `blocking_timeout` elapses.
    ///
    /// Fails with [`LockError::Busy`] carrying the current holder's token
    /// and remaining TTL when the wait runs out.
    pub async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
        blocking_timeout: Duration,
    ) -> Result<LockGuard, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + blocking_timeout;

        loop {
            if self.store.set_nx_ex(key, &token, ttl).await? {
                info!(key, token, ttl_secs = ttl.as_secs(), "lock acquired");
                return Ok(LockGuard {
                    key: key.to_string(),
                    token,
                });
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let (holder, ttl_seconds) = match self.lock_info(key).await? {
            Some(info) => (info.token, info.ttl_seconds),
            // Holder vanished between the last attempt and this read.
            None => ("<released>".to_string(), 0),
        };
        debug!(key, holder, ttl_seconds, "lock acquisition timed out");
        Err(LockError::Busy {
            key: key.to_string(),
            holder,
            ttl_seconds,
        })
    }

    /// Release a held lock, verifying ownership server-side.
    ///
    /// Fails with [`LockError::Lost`] when the stored token no longer
    /// matches; the key is left untouched in that case.
    pub async fn release(&self, guard: &LockGuard) -> Result<(), LockError> {
        if self
            .store
            .compare_and_delete(&guard.key, &guard.token)
            .await?
        {
            info!(key = %guard.key, token = %guard.token, "lock released");
            Ok(())
        } else {
            Err(LockError::Lost {
                key: guard.key.clone(),
            })
        }
    }

    /// Add `additional` to the remaining TTL of a held lock.
    ///
    /// Fails with [`LockError::Lost`] when ownership no longer matches or
    /// the key has already expired.
    pub async fn extend(&self, guard: &LockGuard, additional: Duration) -> Result<(), LockError> {
        if self
            .store
            .compare_and_extend(&guard.key, &guard.token, additional)
            .await?
        {
            debug!(key = %guard.key, additional_secs = additional.as_secs(), "lock extended");
            Ok(())
        } else {
            Err(LockError::Lost {
                key: guard.key.clone(),
            })
        }
    }

    /// Delete a lock unconditionally, bypassing ownership checks.
    ///
    /// Operator recovery path only. Returns whether a lock existed.
    pub async fn force_release(&self, key: &str) -> Result<bool, LockError> {
        let existed = self.store.delete(key).await?;
        if existed {
            warn!(key, "lock force-released, ownership checks bypassed");
        }
        Ok(existed)
    }

    pub async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        Ok(self.store.get(key).await?.is_some())
    }

    /// Diagnostic snapshot of a lock, if one exists.
    pub async fn lock_info(&self, key: &str) -> Result<Option<LockInfo>, LockError> {
        let Some(token) = self.store.get(key).await? else {
            return Ok(None);
        };
        let ttl_seconds = self.store.ttl(key).await?.unwrap_or(0);
        let expires_at = if ttl_seconds > 0 {
            Some(SystemTime::now() + Duration::from_secs(ttl_seconds as u64))
        } else {
            None
        };
        Ok(Some(LockInfo {
            token,
            ttl_seconds,
            expires_at,
        }))
    }

    /// Snapshot every lock whose key matches `pattern` (default `*_lock`).
    pub async fn list_locks(
        &self,
        pattern: Option<&str>,
    ) -> Result<BTreeMap<String, LockInfo>, LockError> {
        let default_pattern = keys::lock_pattern();
        let pattern = pattern.unwrap_or(&default_pattern);

        let mut locks = BTreeMap::new();
        for key in self.store.keys(pattern).await? {
            // A key can expire between the scan and the read.
            match self.lock_info(&key).await {
                Ok(Some(info)) => {
                    locks.insert(key, info);
                }
                Ok(None) => {}
                Err(LockError::Store(StoreError::Command(e))) => {
                    debug!(key, error = %e, "skipping non-lock key in scan");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(locks)
    }
}
