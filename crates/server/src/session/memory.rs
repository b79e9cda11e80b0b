use super::{SessionStore, SessionStoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process session store used when no Redis URL is configured, and in
/// tests. Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
        let expired = match entries.get(key) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).map(|e| e.value.clone()))
    }

    async fn exists(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut entries = self.entries.lock();
        let was_live = Self::live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(was_live)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, SessionStoreError> {
        let mut entries = self.entries.lock();
        let matches = Self::live(&mut entries, key).is_some_and(|e| e.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }
}
