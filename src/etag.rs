//! Conditional Cache Module
//!
//! Content-hash ETags for conditional responses. Maps are canonicalized
//! (keys sorted, recursively) before hashing, so field order never changes
//! the tag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::sha256_hex;
use crate::health::ComponentHealth;
use crate::store::{with_timeout, KvStore};

/// Key namespace for ETag records inside the shared key/value store.
pub const ETAG_NAMESPACE: &str = "etag:";

const WEAK_PREFIX: &str = "W/";

/// Hex digits kept from the SHA-256 digest.
const TAG_HEX_LEN: usize = 32;

// == Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct EtagStats {
    pub generated: u64,
    /// `get` calls that found a stored tag
    pub hits: u64,
    /// `get` calls that found nothing
    pub misses: u64,
    pub stores: u64,
    /// Records dropped after the resource changed
    pub invalidations: u64,
    pub validations: u64,
    pub matches: u64,
    /// Store failures absorbed as misses or failed writes
    pub errors: u64,
}

#[derive(Debug, Default)]
struct EtagCounters {
    generated: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    invalidations: AtomicU64,
    validations: AtomicU64,
    matches: AtomicU64,
    errors: AtomicU64,
}

// == Conditional Cache Manager ==
pub struct ConditionalCacheManager {
    store: Arc<dyn KvStore>,
    default_ttl: Duration,
    timeout: Duration,
    counters: EtagCounters,
}

impl ConditionalCacheManager {
    pub fn new(store: Arc<dyn KvStore>, default_ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            default_ttl,
            timeout,
            counters: EtagCounters::default(),
        }
    }

    /// Lifetime of records stored without an explicit TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Generate ==
    /// Builds an ETag for structured `content`.
    pub fn generate(&self, content: &Value, weak: bool) -> String {
        let canonical = canonicalize(content);
        // Serializing a Value cannot fail: all map keys are strings
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        self.generate_bytes(&bytes, weak)
    }

    /// Builds an ETag over raw bytes (non-JSON bodies).
    pub fn generate_bytes(&self, bytes: &[u8], weak: bool) -> String {
        self.counters.generated.fetch_add(1, Ordering::Relaxed);

        let hex = sha256_hex(bytes);
        let tag = &hex[..TAG_HEX_LEN];

        if weak {
            format!("{WEAK_PREFIX}\"{tag}\"")
        } else {
            format!("\"{tag}\"")
        }
    }

    // == Get ==
    /// Returns the stored tag for `key`; store failures read as absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        let store_key = format!("{ETAG_NAMESPACE}{key}");
        let result = with_timeout("etag_get", self.timeout, self.store.get(&store_key)).await;

        match result {
            Ok(Some(bytes)) => match String::from_utf8(bytes) {
                Ok(tag) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    Some(tag)
                }
                Err(_) => {
                    warn!("Discarding non-UTF-8 ETag record for {}", key);
                    self.counters.errors.fetch_add(1, Ordering::Relaxed);
                    None
                }
            },
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!("ETag lookup failed for {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    // == Set ==
    /// Records `etag` for `key`; returns false when the store rejected it.
    pub async fn set(&self, key: &str, etag: &str, ttl: Option<Duration>) -> bool {
        let store_key = format!("{ETAG_NAMESPACE}{key}");
        let ttl = ttl.unwrap_or(self.default_ttl);
        let result = with_timeout(
            "etag_set",
            self.timeout,
            self.store.set(&store_key, etag.as_bytes().to_vec(), ttl),
        )
        .await;

        match result {
            Ok(()) => {
                self.counters.stores.fetch_add(1, Ordering::Relaxed);
                debug!("Stored ETag {} for {}", etag, key);
                true
            }
            Err(e) => {
                warn!("ETag store failed for {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Drops the stored tag for `key`, returning whether one existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let store_key = format!("{ETAG_NAMESPACE}{key}");
        match with_timeout("etag_delete", self.timeout, self.store.delete(&store_key)).await {
            Ok(existed) => {
                if existed {
                    self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                }
                existed
            }
            Err(e) => {
                warn!("ETag invalidation failed for {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Drops every stored tag whose key matches the glob `pattern`.
    pub async fn invalidate_matching(&self, pattern: &str) -> usize {
        let store_pattern = format!("{ETAG_NAMESPACE}{pattern}");
        match with_timeout(
            "etag_delete_matching",
            self.timeout,
            self.store.delete_matching(&store_pattern),
        )
        .await
        {
            Ok(count) => {
                self.counters
                    .invalidations
                    .fetch_add(count as u64, Ordering::Relaxed);
                count
            }
            Err(e) => {
                warn!("ETag invalidation of {} failed: {}", pattern, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                0
            }
        }
    }

    // == Validate ==
    /// Compares a client's `If-None-Match` value with a stored tag.
    ///
    /// The client value may list several tags. Absence on either side is a
    /// mismatch, and `*` is not treated as a wildcard.
    pub fn validate(&self, client_etag: Option<&str>, stored_etag: Option<&str>) -> bool {
        self.counters.validations.fetch_add(1, Ordering::Relaxed);
        let matched = etags_match(client_etag, stored_etag);
        if matched {
            self.counters.matches.fetch_add(1, Ordering::Relaxed);
        }
        matched
    }

    pub fn metrics(&self) -> EtagStats {
        EtagStats {
            generated: self.counters.generated.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            validations: self.counters.validations.load(Ordering::Relaxed),
            matches: self.counters.matches.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    pub async fn health_check(&self) -> ComponentHealth {
        match with_timeout("etag_ping", self.timeout, self.store.ping()).await {
            Ok(()) => ComponentHealth::healthy(format!(
                "{} validations, {} matches",
                self.counters.validations.load(Ordering::Relaxed),
                self.counters.matches.load(Ordering::Relaxed)
            )),
            Err(e) => ComponentHealth::degraded(format!("store unreachable, tags not persisted: {}", e)),
        }
    }
}

/// Pure comparison behind [`ConditionalCacheManager::validate`].
pub fn etags_match(client_etag: Option<&str>, stored_etag: Option<&str>) -> bool {
    let (Some(client), Some(stored)) = (client_etag, stored_etag) else {
        return false;
    };
    let stored = normalize(stored);
    if stored.is_empty() {
        return false;
    }

    client
        .split(',')
        .map(normalize)
        .any(|candidate| !candidate.is_empty() && candidate != "*" && candidate == stored)
}

/// Strips the weak prefix and surrounding quotes.
fn normalize(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix(WEAK_PREFIX).unwrap_or(tag);
    tag.trim_matches('"')
}

/// Recursively rebuilds `value` with object keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
