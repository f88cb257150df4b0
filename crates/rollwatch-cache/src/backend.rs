//! Key-value backends the verdict store writes through.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// The three cache operations a verdict needs.
pub trait CacheBackend: Send {
    /// Store `value` under `key`, replacing any previous value and expiry.
    fn set(&mut self, key: &str, value: &str) -> impl Future<Output = CacheResult<()>> + Send;

    /// Expire `key` after `ttl`. The key must exist.
    fn expire(&mut self, key: &str, ttl: Duration) -> impl Future<Output = CacheResult<()>> + Send;

    fn get(&mut self, key: &str) -> impl Future<Output = CacheResult<Option<String>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

/// In-process backend with Redis `SET` / `EXPIRE` semantics. Expiry is
/// recorded, not enforced.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, Entry>,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).and_then(|e| e.ttl)
    }

    /// Number of `SET` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        // SET discards any previous TTL.
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl: None,
            },
        );
        self.writes += 1;
        Ok(())
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> CacheResult<()> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.ttl = Some(ttl);
                Ok(())
            }
            None => Err(CacheError::UnexpectedReply {
                command: "EXPIRE".to_string(),
                reply: ":0".to_string(),
            }),
        }
    }

    async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.value(key).map(str::to_string))
    }
}
