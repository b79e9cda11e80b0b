//! Redis-backed session store.
//!
//! Keys are plain strings with a server-side expiry (`SET key value EX ttl`),
//! so a revoked or lapsed record vanishes without a cleanup task.

use super::{SessionStore, SessionStoreError};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use std::time::Duration;
use tracing::info;

const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    compare_and_delete: Script,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> Result<Self, SessionStoreError> {
        let client =
            Client::open(redis_url).map_err(|e| SessionStoreError::Unavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))?;

        info!(url = %redis_url, "[Session] Connected to Redis");
        Ok(Self {
            conn,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
        })
    }
}

fn command_err(err: redis::RedisError) -> SessionStoreError {
    if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        SessionStoreError::Unavailable(err.to_string())
    } else {
        SessionStoreError::Command(err.to_string())
    }
}

/// `EX` takes whole seconds and rejects zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl))
            .await
            .map_err(command_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(command_err)
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.map_err(command_err)
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(command_err)?;
        Ok(removed > 0)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(command_err)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounds_up_to_whole_seconds() {
        assert_eq!(ttl_seconds(Duration::from_secs(10)), 10);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
    }
}
