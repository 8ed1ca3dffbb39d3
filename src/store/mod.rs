//! Store Module
//!
//! Backing stores shared by the caching layer. Components only talk to the
//! [`KvStore`] and [`WindowStore`] traits, so a networked store can replace
//! the in-memory one without touching component logic.

mod entry;
mod lru;
mod memory;
mod pattern;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CacheError, Result};

pub use entry::{current_timestamp_ms, StoredValue};
pub use lru::LruTracker;
pub use memory::{MemoryStore, MemoryStoreStats};
pub use pattern::{escape_glob, glob_match};

// == Key/Value Store ==
/// Byte-oriented key/value store with per-entry expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the stored bytes, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Removes `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every key matching the glob `pattern`, returning the count.
    async fn delete_matching(&self, pattern: &str) -> Result<usize>;

    /// Round-trips to the store without side effects.
    async fn ping(&self) -> Result<()>;
}

// == Window Store ==
/// Outcome of one atomic purge-count-insert on a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    /// Timestamps inside the window before this request was considered
    pub count: u32,
    /// Whether `now` was recorded
    pub admitted: bool,
    /// Oldest timestamp still inside the window after the operation (ms)
    pub oldest_ms: Option<u64>,
}

/// Store of per-key request timestamps for sliding-window admission.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Atomically drops timestamps at or before `now_ms - window`, counts the
    /// rest, and records `now_ms` only when the count is below `limit`.
    async fn admit(
        &self,
        key: &str,
        now_ms: u64,
        window: Duration,
        limit: u32,
    ) -> Result<WindowDecision>;

    /// Forgets every timestamp recorded for `key`.
    async fn clear(&self, key: &str) -> Result<()>;

    /// Round-trips to the store without side effects.
    async fn ping(&self) -> Result<()>;
}

// == Timeout Helper ==
/// Runs a store call under `timeout`, mapping expiry to [`CacheError::Timeout`].
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
