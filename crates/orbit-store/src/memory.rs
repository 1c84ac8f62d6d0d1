use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::client::CoordinationStore;
use crate::error::StoreError;

enum Value {
    Str(String),
    ZSet(BTreeMap<String, f64>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

struct Inner {
    entries: HashMap<String, Entry>,
    clock_skew: Duration,
    available: bool,
}

/// In-process [`CoordinationStore`] for tests and local development.
///
/// Single-process only; the mutex gives the same atomicity per operation
/// that Redis gives per command/script. [`MemoryStore::advance`] shifts a
/// logical clock so expiry behavior is testable without real sleeps, and
/// [`MemoryStore::set_available`] simulates an unreachable store.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock_skew: Duration::ZERO,
                available: true,
            }),
        }
    }

    /// Move the store's notion of "now" forward.
    pub fn advance(&self, by: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock_skew += by;
    }

    /// Toggle simulated reachability; while `false` every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.available = available;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn now(&self) -> Instant {
        Instant::now() + self.clock_skew
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked offline".into()))
        }
    }

    /// Drop the entry if its expiry has passed, then return it.
    fn live_entry(&mut self, key: &str) -> Option<&mut Entry> {
        let now = self.now();
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn zset_mut(&mut self, key: &str) -> Option<&mut BTreeMap<String, f64>> {
        match self.live_entry(key) {
            Some(Entry {
                value: Value::ZSet(members),
                ..
            }) => Some(members),
            _ => None,
        }
    }
}

/// Glob matcher for KEYS-style patterns (`*` and `?` only).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    fn matches(p: &[char], t: &[char]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&p[1..], t) || (!t.is_empty() && matches(p, &t[1..]))
            }
            (Some('?'), Some(_)) => matches(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => matches(&p[1..], &t[1..]),
            _ => false,
        }
    }
    matches(&p, &t)
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.lock().unwrap().check_available()
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        if inner.live_entry(key).is_some() {
            return Ok(false);
        }
        let expires_at = Some(inner.now() + ttl);
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.live_entry(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Some(s.clone()),
            _ => None,
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let existed = inner.live_entry(key).is_some();
        inner.entries.remove(key);
        Ok(existed)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let owns = matches!(
            inner.live_entry(key),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) if s.as_str() == expected
        );
        if owns {
            inner.entries.remove(key);
        }
        Ok(owns)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        additional: Duration,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let now = inner.now();
        if let Some(Entry {
            value: Value::Str(s),
            expires_at: Some(at),
        }) = inner.live_entry(key)
            && s.as_str() == expected
            && *at > now
        {
            *at += additional;
            return Ok(true);
        }
        Ok(false)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let now = inner.now();
        Ok(match inner.live_entry(key) {
            None => None,
            Some(Entry {
                expires_at: None, ..
            }) => Some(-1),
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                let remaining = at.saturating_duration_since(now);
                Some(remaining.as_secs_f64().ceil() as i64)
            }
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let now = inner.now();
        match inner.live_entry(key) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        let now = inner.now();
        inner
            .entries
            .retain(|_, e| e.expires_at.is_none_or(|at| at > now));
        let mut keys: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn zwindow_consume(
        &self,
        key: &str,
        cutoff: f64,
        member: &str,
        score: f64,
        expiry: Duration,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        inner.live_entry(key);
        let expires_at = Some(inner.now() + expiry);

        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::ZSet(BTreeMap::new()),
            expires_at: None,
        });
        entry.expires_at = expires_at;
        let members = match &mut entry.value {
            Value::ZSet(m) => m,
            Value::Str(_) => {
                return Err(StoreError::Command(format!(
                    "WRONGTYPE key {key} holds a string"
                )));
            }
        };

        members.retain(|_, s| *s > cutoff);
        let count = members.len() as u64;
        members.insert(member.to_string(), score);
        Ok(count)
    }

    async fn zwindow_count(&self, key: &str, cutoff: f64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.zset_mut(key) {
            Some(members) => {
                members.retain(|_, s| *s > cutoff);
                members.len() as u64
            }
            None => 0,
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        inner.live_entry(key);
        let entry = inner.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::ZSet(BTreeMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::ZSet(members) => {
                members.insert(member.to_string(), score);
                Ok(())
            }
            Value::Str(_) => Err(StoreError::Command(format!(
                "WRONGTYPE key {key} holds a string"
            ))),
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.zset_mut(key) {
            Some(members) => members.remove(member).is_some(),
            None => false,
        })
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.zset_mut(key) {
            Some(members) => members.len() as u64,
            None => 0,
        })
    }

    async fn zrange_oldest(&self, key: &str) -> Result<Option<(String, f64)>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.zset_mut(key) {
            Some(members) => members
                .iter()
                .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
                .map(|(m, s)| (m.clone(), *s)),
            None => None,
        })
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<(String, f64)>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_available()?;
        Ok(match inner.zset_mut(key) {
            Some(members) => {
                let mut all: Vec<(String, f64)> =
                    members.iter().map(|(m, s)| (m.clone(), *s)).collect();
                all.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                all
            }
            None => Vec::new(),
        })
    }
}
