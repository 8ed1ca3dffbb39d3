//! In-Memory Store Module
//!
//! Process-local implementation of both [`KvStore`] and [`WindowStore`],
//! combining HashMap storage with LRU tracking and TTL expiration.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{
    current_timestamp_ms, glob_match, KvStore, LruTracker, StoredValue, WindowDecision,
    WindowStore,
};
use crate::error::Result;

// == Memory Store Stats ==
/// Counters describing the in-memory store itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStoreStats {
    /// Live entries in the key/value map
    pub entries: usize,
    /// Tracked sliding windows
    pub windows: usize,
    /// Entries evicted due to capacity
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct KvInner {
    entries: HashMap<String, StoredValue>,
    lru: LruTracker,
    evictions: u64,
    expirations: u64,
}

#[derive(Debug)]
struct Window {
    timestamps: VecDeque<u64>,
    window_ms: u64,
}

impl Window {
    fn purge(&mut self, now_ms: u64) {
        while let Some(&oldest) = self.timestamps.front() {
            if oldest.saturating_add(self.window_ms) <= now_ms {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

// == Memory Store ==
/// In-memory key/value and window store.
///
/// The window map sits behind a single mutex, so purge, count and insert
/// for a key always execute as one unit.
#[derive(Debug)]
pub struct MemoryStore {
    kv: RwLock<KvInner>,
    windows: Mutex<HashMap<String, Window>>,
    max_entries: usize,
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` key/value entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            kv: RwLock::new(KvInner::default()),
            windows: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.kv.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.kv.read().await.entries.is_empty()
    }

    pub async fn stats(&self) -> MemoryStoreStats {
        let kv = self.kv.read().await;
        let windows = self.windows.lock().await;
        MemoryStoreStats {
            entries: kv.entries.len(),
            windows: windows.len(),
            evictions: kv.evictions,
            expirations: kv.expirations,
        }
    }

    // == Cleanup Expired ==
    /// Removes expired entries and empty windows.
    ///
    /// Returns the number of key/value entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();

        let removed = {
            let mut kv = self.kv.write().await;
            let expired: Vec<String> = kv
                .entries
                .iter()
                .filter(|(_, value)| value.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                kv.entries.remove(key);
                kv.lru.remove(key);
            }
            kv.expirations += expired.len() as u64;
            expired.len()
        };

        let mut windows = self.windows.lock().await;
        windows.retain(|_, window| {
            window.purge(now);
            !window.timestamps.is_empty()
        });

        removed
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut kv = self.kv.write().await;

        let expired = match kv.entries.get(key) {
            None => return Ok(None),
            Some(value) => value.is_expired(),
        };

        if expired {
            kv.entries.remove(key);
            kv.lru.remove(key);
            kv.expirations += 1;
            return Ok(None);
        }

        kv.lru.touch(key);
        Ok(kv.entries.get(key).map(|value| value.bytes.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut kv = self.kv.write().await;

        if !kv.entries.contains_key(key) && kv.entries.len() >= self.max_entries {
            if let Some(evicted) = kv.lru.evict_oldest() {
                debug!("Evicting least recently used key: {}", evicted);
                kv.entries.remove(&evicted);
                kv.evictions += 1;
            }
        }

        kv.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        kv.lru.touch(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut kv = self.kv.write().await;
        kv.lru.remove(key);
        Ok(kv.entries.remove(key).is_some())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        let mut kv = self.kv.write().await;
        let matching: Vec<String> = kv
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        for key in &matching {
            kv.entries.remove(key);
            kv.lru.remove(key);
        }
        Ok(matching.len())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn admit(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        limit: u32,
    ) -> Result<WindowDecision> {
        let window_ms = window.as_millis() as u64;
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert_with(|| Window {
            timestamps: VecDeque::new(),
            window_ms,
        });
        entry.window_ms = window_ms;
        entry.purge(now_ms);

        let count = entry.timestamps.len() as u32;
        let admitted = count < limit;
        if admitted {
            entry.timestamps.push_back(now_ms);
        }

        Ok(WindowDecision {
            count,
            admitted,
            oldest_ms: entry.timestamps.front().copied(),
        })
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.windows.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
