//! Cache Entry Module
//!
//! The envelope CacheStore writes to the backing store: serialized value
//! plus the metadata needed to read it back.

use serde::{Deserialize, Serialize};

use super::strategy::SerializationFormat;
use crate::compression::Encoding;
use crate::error::Result;
use crate::store::current_timestamp_ms;

// == Cache Entry ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Composed cache key
    pub key: String,
    /// Serialized (and possibly compressed) value
    pub payload: Vec<u8>,
    pub compressed: bool,
    /// Encoding applied to `payload`; `Identity` when uncompressed
    pub encoding: Encoding,
    pub format: SerializationFormat,
    /// Unix milliseconds
    pub stored_at: u64,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn new(
        key: String,
        payload: Vec<u8>,
        encoding: Encoding,
        format: SerializationFormat,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            key,
            payload,
            compressed: encoding != Encoding::Identity,
            encoding,
            format,
            stored_at: current_timestamp_ms(),
            ttl_seconds,
        }
    }

    /// Second line of defense for stores with coarse expiry.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at()
    }

    pub fn expires_at(&self) -> u64 {
        self.stored_at
            .saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    /// Envelope bytes as written to the store.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
