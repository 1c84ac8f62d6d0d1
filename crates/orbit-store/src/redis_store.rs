use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tracing::{debug, info};

use crate::client::CoordinationStore;
use crate::error::StoreError;

/// Compare value then delete, as one server-side step.
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Compare value then add to the remaining TTL, as one server-side step.
/// A key without a positive TTL (expired or persistent) is left untouched.
const COMPARE_AND_EXTEND: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    local current_ttl = redis.call("TTL", KEYS[1])
    if current_ttl > 0 then
        return redis.call("EXPIRE", KEYS[1], current_ttl + tonumber(ARGV[2]))
    end
end
return 0
"#;

/// Redis-backed [`CoordinationStore`] over a multiplexed connection manager.
pub struct RedisStore {
    conn: ConnectionManager,
    compare_and_delete: Script,
    compare_and_extend: Script,
}

impl RedisStore {
    /// Connect and verify the server answers PING.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(StoreError::from)?;
        let conn = ConnectionManager::new(client).await.map_err(StoreError::from)?;

        let store = Self {
            conn,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            compare_and_extend: Script::new(COMPARE_AND_EXTEND),
        };
        store.ping().await?;
        info!(url, "coordination store connected");
        Ok(store)
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(StoreError::from)
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed == 1)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        additional: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let extended: i64 = self
            .compare_and_extend
            .key(key)
            .arg(expected)
            .arg(additional.as_secs())
            .invoke_async(&mut conn)
            .await?;
        Ok(extended == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        // -2 means the key does not exist, -1 means no expiry.
        if ttl == -2 { Ok(None) } else { Ok(Some(ttl)) }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let set: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(set == 1)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        debug!(pattern, count = keys.len(), "key pattern scan");
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
        let mut conn = self.conn.clone();
        let (_trimmed, count, _added, _expired): (i64, i64, i64, i64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(cutoff)
            .cmd("ZCARD")
            .arg(key)
            .cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .cmd("EXPIRE")
            .arg(key)
            .arg(expiry.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn zwindow_count(&self, key: &str, cutoff: f64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let (_trimmed, count): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(cutoff)
            .cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count.max(0) as u64)
    }

    async fn zrange_oldest(&self, key: &str) -> Result<Option<(String, f64)>, StoreError> {
        let mut conn = self.conn.clone();
        let mut head: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(head.pop())
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<(String, f64)>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }
}
