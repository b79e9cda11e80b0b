//! Session Store
//!
//! Key/value backing store for refresh-token validity records and the
//! access-token blacklist. Every operation is a single-key atomic call;
//! nothing here needs multi-key transactions.

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
    #[error("Session store command failed: {0}")]
    Command(String),
}

/// Minimal KV contract the token layer relies on.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store `value` under `key`, replacing any previous value. The record
    /// disappears once `ttl` has elapsed.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError>;

    /// Returns whether a live record was removed.
    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError>;

    /// Remove `key` only if it currently holds `expected`, as one atomic
    /// step. Returns whether the record was removed.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, SessionStoreError>;
}

/// Key holding the id of the subject's current refresh token.
pub fn refresh_validity_key(subject: &str) -> String {
    format!("refresh-validity:{subject}")
}

/// Key marking a raw access token as revoked.
pub fn access_blacklist_key(raw_token: &str) -> String {
    format!("blacklist:access:{raw_token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespaces() {
        assert_eq!(refresh_validity_key("u1"), "refresh-validity:u1");
        assert_eq!(access_blacklist_key("abc.def"), "blacklist:access:abc.def");
    }
}
