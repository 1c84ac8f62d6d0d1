use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use uuid::Uuid;

use orbit_model::{ActiveRateLimit, RateLimitDecision, RateLimitUsage};
use orbit_store::{CoordinationStore, keys};

/// Extra key lifetime beyond the window, so a window that is still being
/// read never expires out from under the trim/count round trip.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

fn real_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Sliding-window request quota per (identifier, endpoint), backed by an
/// ordered set of request timestamps in the coordination store.
///
/// The limiter never returns an error: when the store is unreachable it
/// fails open and tags the decision as degraded, because an unavailable
/// limiter must not become an outage of the protected service.
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
    clock: fn() -> f64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self {
            store,
            clock: real_now_secs,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> f64) -> Self {
        self.clock = clock;
        self
    }

    fn fail_open(limit: u32, now: f64, window: Duration) -> RateLimitDecision {
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit,
            reset_at: (now + window.as_secs_f64()) as u64,
            retry_after: None,
            degraded: true,
        }
    }

    /// Check the quota and, if allowed, consume one slot.
    ///
    /// Trim, count, speculative add and expiry refresh run as one atomic
    /// store round trip; on denial the speculative entry is removed again
    /// and `retry_after` is derived from the oldest surviving entry.
    pub async fn check_and_consume(
        &self,
        identifier: &str,
        endpoint: &str,
        limit: u32,
        window: Duration,
    ) -> RateLimitDecision {
        let now = (self.clock)();
        let cutoff = now - window.as_secs_f64();
        let key = keys::rate_limit(identifier, endpoint);
        // Unique member per request; concurrent callers in the same
        // instant must not collapse into one entry.
        let member = format!("{now:.6}:{}", Uuid::new_v4());

        let count = match self
            .store
            .zwindow_consume(&key, cutoff, &member, now, window + EXPIRY_MARGIN)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(identifier, endpoint, error = %e, "rate limit check failed open");
                return Self::fail_open(limit, now, window);
            }
        };

        if count >= u64::from(limit) {
            // Roll back the speculative entry; the request is denied.
            if let Err(e) = self.store.zrem(&key, &member).await {
                warn!(identifier, endpoint, error = %e, "failed to roll back denied entry");
            }

            let retry_after = match self.store.zrange_oldest(&key).await {
                Ok(Some((_, oldest))) => (oldest + window.as_secs_f64() - now).ceil() as i64,
                Ok(None) => window.as_secs() as i64,
                Err(e) => {
                    warn!(identifier, endpoint, error = %e, "failed to read oldest entry");
                    window.as_secs() as i64
                }
            };
            let retry_after = retry_after.max(1) as u64;

            debug!(identifier, endpoint, limit, retry_after, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: now as u64 + retry_after,
                retry_after: Some(retry_after),
                degraded: false,
            };
        }

        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(count as u32).saturating_sub(1),
            reset_at: (now + window.as_secs_f64()) as u64,
            retry_after: None,
            degraded: false,
        }
    }

    /// Current usage without consuming a slot.
    pub async fn get_info(
        &self,
        identifier: &str,
        endpoint: &str,
        limit: u32,
        window: Duration,
    ) -> RateLimitUsage {
        let now = (self.clock)();
        let cutoff = now - window.as_secs_f64();
        let key = keys::rate_limit(identifier, endpoint);

        let used = match self.store.zwindow_count(&key, cutoff).await {
            Ok(count) => count as u32,
            Err(e) => {
                warn!(identifier, endpoint, error = %e, "rate limit info unavailable");
                0
            }
        };

        RateLimitUsage {
            limit,
            used,
            remaining: limit.saturating_sub(used),
            reset_at: (now + window.as_secs_f64()) as u64,
        }
    }

    /// Drop the window for one (identifier, endpoint) pair.
    pub async fn reset(&self, identifier: &str, endpoint: &str) -> bool {
        let key = keys::rate_limit(identifier, endpoint);
        match self.store.delete(&key).await {
            Ok(existed) => {
                info!(identifier, endpoint, "rate limit reset");
                existed
            }
            Err(e) => {
                warn!(identifier, endpoint, error = %e, "rate limit reset failed");
                false
            }
        }
    }

    /// Operator view of every active window, with counts and TTLs.
    pub async fn list_active(&self) -> Vec<ActiveRateLimit> {
        let pattern = keys::rate_limit_pattern();
        let found = match self.store.keys(&pattern).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "rate limit enumeration failed");
                return Vec::new();
            }
        };

        let mut active = Vec::new();
        for key in found {
            let Some((identifier, endpoint)) = keys::parse_rate_limit(&key) else {
                continue;
            };
            let current_requests = self.store.zcard(&key).await.unwrap_or(0) as u32;
            let ttl_seconds = self.store.ttl(&key).await.ok().flatten().unwrap_or(0);
            active.push(ActiveRateLimit {
                identifier,
                endpoint,
                current_requests,
                ttl_seconds,
            });
        }
        active
    }
}
