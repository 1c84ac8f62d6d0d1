//! Key naming for everything this core stores.
//!
//! One place owns the formats so the operator-facing pattern scans and the
//! writers can never drift apart.

/// Prefix for sliding-window rate-limit keys.
pub const RATE_LIMIT_PREFIX: &str = "rate_limit";

/// Suffix shared by all lock keys, so `*_lock` enumerates them.
pub const LOCK_SUFFIX: &str = "_lock";

/// Ordered set holding terminal task outcomes for statistics.
pub const TASK_EVENTS_KEY: &str = "task_events";

/// Key of one rate-limit window: `rate_limit:{endpoint}:{identifier}`.
///
/// The endpoint comes before the identifier because identifiers may
/// themselves contain `:` (IPv6 addresses, api keys).
pub fn rate_limit(identifier: &str, endpoint: &str) -> String {
    format!("{RATE_LIMIT_PREFIX}:{endpoint}:{identifier}")
}

/// Pattern matching every rate-limit key.
pub fn rate_limit_pattern() -> String {
    format!("{RATE_LIMIT_PREFIX}:*")
}

/// Recover `(identifier, endpoint)` from a rate-limit key.
pub fn parse_rate_limit(key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(RATE_LIMIT_PREFIX)?.strip_prefix(':')?;
    let (endpoint, identifier) = rest.split_once(':')?;
    if endpoint.is_empty() || identifier.is_empty() {
        return None;
    }
    Some((identifier.to_string(), endpoint.to_string()))
}

/// Lock key for a named resource: `{name}_lock`.
pub fn lock(name: &str) -> String {
    format!("{name}{LOCK_SUFFIX}")
}

/// Pattern matching every lock key.
pub fn lock_pattern() -> String {
    format!("*{LOCK_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_roundtrip() {
        let key = rate_limit("10.0.0.1", "launches");
        assert_eq!(key, "rate_limit:launches:10.0.0.1");

        let (identifier, endpoint) = parse_rate_limit(&key).unwrap();
        assert_eq!(identifier, "10.0.0.1");
        assert_eq!(endpoint, "launches");
    }

    #[test]
    fn identifier_may_contain_colons() {
        let key = rate_limit("2001:db8::1", "stats");
        let (identifier, endpoint) = parse_rate_limit(&key).unwrap();
        assert_eq!(identifier, "2001:db8::1");
        assert_eq!(endpoint, "stats");
    }

    #[test]
    fn parse_rejects_foreign_keys() {
        assert!(parse_rate_limit("refresh_cycle_lock").is_none());
        assert!(parse_rate_limit("rate_limit:broken").is_none());
    }

    #[test]
    fn lock_keys_share_the_suffix() {
        assert_eq!(lock("refresh_cycle"), "refresh_cycle_lock");
        assert_eq!(lock_pattern(), "*_lock");
    }
}
