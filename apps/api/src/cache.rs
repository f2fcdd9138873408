//! TTL response cache — process-local, write-once-per-key, lazily evicted.
//!
//! Intentionally unbounded: the key space is comparison fingerprints, which
//! is low-cardinality for this process lifetime, so there is no LRU and no
//! capacity cap. Expired entries are removed lazily on `get`/`has` and
//! swept synchronously on every `set` and `len` call rather than by a
//! background task.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Shared TTL key-value cache. Clone is cheap (Arc).
#[derive(Clone)]
pub struct TtlCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Stores `value` under `key` with expiry = now + TTL, replacing any
    /// previous entry whole, then sweeps all expired entries.
    pub fn set(&self, key: String, value: serde_json::Value) {
        let now = Instant::now();
        let mut entries = self.inner.write().unwrap();
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        entries.retain(|_, e| e.expires_at > now);
    }

    /// Returns the stored value if present and unexpired, else `None`.
    /// An entry found expired is removed on the spot.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Instant::now();
        let mut entries = self.inner.write().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// `get`'s expiry check without cloning the stored value.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.inner.write().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    /// Live entry count. Sweeps first so the number excludes expired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.write().unwrap();
        entries.retain(|_, e| e.expires_at > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
