use serde::{Deserialize, Serialize};

/// Outcome of a quota check that also consumed one slot on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Configured request ceiling for the window.
    pub limit: u32,
    /// Slots left in the window after this request.
    pub remaining: u32,
    /// Epoch seconds at which the window fully resets.
    pub reset_at: u64,
    /// Seconds the caller should wait before retrying, on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Set when the store was unreachable and the limiter failed open.
    #[serde(default)]
    pub degraded: bool,
}

/// Read-only usage snapshot for an (identifier, endpoint) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitUsage {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    pub reset_at: u64,
}

/// Operator view of one active rate-limit window in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRateLimit {
    pub identifier: String,
    pub endpoint: String,
    pub current_requests: u32,
    pub ttl_seconds: i64,
}
