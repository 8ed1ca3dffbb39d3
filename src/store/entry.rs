//! Stored Value Module
//!
//! A byte payload held by the in-memory store, with its expiry deadline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Stored Value ==
/// A single value held by [`super::MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// The stored bytes
    pub bytes: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl StoredValue {
    /// Creates a value that expires `ttl` from now.
    pub fn new(bytes: Vec<u8>, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        Self {
            bytes,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
        }
    }

    /// An entry is expired once the current time reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
