use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;

use crate::error::AdmissionError;
use crate::store::{CounterStore, WindowHit};

const KEY_PREFIX: &str = "admission:";

// INCR and expiry in one round trip so concurrent instances never lose a hit.
// A key without a TTL (expiry lost or key created elsewhere) gets one re-armed.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

/// Shared counter store for multi-instance deployments
pub struct RedisStore {
    connection: MultiplexedConnection,
    increment: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, AdmissionError> {
        let client = Client::open(redis_url)
            .map_err(|e| AdmissionError::Redis(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AdmissionError::Redis(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            increment: Script::new(INCREMENT_SCRIPT),
        })
    }

    fn redis_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowHit, AdmissionError> {
        let mut conn = self.connection.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let (count, ttl_ms): (u64, i64) = self
            .increment
            .key(Self::redis_key(key))
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AdmissionError::Redis(format!("Increment script failed: {}", e)))?;

        Ok(WindowHit {
            count,
            reset_after: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn reset(&self, key: &str) -> Result<(), AdmissionError> {
        let mut conn = self.connection.clone();
        redis::cmd("DEL")
            .arg(Self::redis_key(key))
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| AdmissionError::Redis(format!("DEL failed: {}", e)))?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(RedisStore::redis_key("api:10.0.0.1"), "admission:api:10.0.0.1");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisStore::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(AdmissionError::Redis(_))));
    }
}
