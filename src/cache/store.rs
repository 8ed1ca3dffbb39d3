//! Cache Store Module
//!
//! Strategy-keyed cache over a shared [`KvStore`]. Values are serialized per
//! the strategy's format, compressed when large enough and worth it, and
//! wrapped in a [`CacheEntry`] envelope.
//!
//! Every store failure degrades: reads become misses, writes report `false`.
//! Only an unknown strategy name surfaces as an error.
//!
//! An optional [`CacheListener`] hears about every successful write, delete
//! and invalidation.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::key::identifier_pattern;
use crate::cache::stats::CacheCounters;
use crate::cache::{
    CacheEntry, CacheKey, CacheListener, CacheStats, CacheStrategy, SerializationFormat,
    StrategyTable,
};
use crate::compression::{CompressionManager, Encoding};
use crate::error::{CacheError, Result};
use crate::health::ComponentHealth;
use crate::store::{current_timestamp_ms, with_timeout, KvStore};

/// Key namespace for cache entries inside the shared key/value store.
pub const CACHE_NAMESPACE: &str = "cache:";

/// Serialized values must exceed this size before compression is tried.
pub const COMPRESSION_THRESHOLD: usize = 1024;

// == Cache Store ==
pub struct CacheStore {
    store: Arc<dyn KvStore>,
    strategies: Arc<StrategyTable>,
    compression: Arc<CompressionManager>,
    timeout: Duration,
    counters: CacheCounters,
    listener: Option<Arc<dyn CacheListener>>,
}

impl CacheStore {
    pub fn new(
        store: Arc<dyn KvStore>,
        strategies: Arc<StrategyTable>,
        compression: Arc<CompressionManager>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            strategies,
            compression,
            timeout,
            counters: CacheCounters::default(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn CacheListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Composes the key for a call, validating the strategy name.
    pub fn key_for(
        &self,
        strategy: &str,
        identifier: &str,
        params: &[(&str, &str)],
    ) -> Result<CacheKey> {
        self.strategies.get(strategy)?;
        Ok(CacheKey::compose(strategy, identifier, params))
    }

    // == Get ==
    /// Returns the cached value, or `None` on miss, expiry, store outage or
    /// undecodable data. Callers treat `None` as "compute fresh".
    pub async fn get<T: DeserializeOwned>(
        &self,
        strategy: &str,
        identifier: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let found = self.get_with_ttl(strategy, identifier, params).await?;
        Ok(found.map(|(value, _)| value))
    }

    /// Like [`get`](Self::get), also returning how long the entry has left.
    pub async fn get_with_ttl<T: DeserializeOwned>(
        &self,
        strategy: &str,
        identifier: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<(T, Duration)>> {
        let policy = self.strategies.get(strategy)?;
        let key = CacheKey::compose(strategy, identifier, params);
        let store_key = namespaced(&key);

        let bytes = match with_timeout("get", self.timeout, self.store.get(&store_key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss: {}", key);
                self.counters.record_miss();
                return Ok(None);
            }
            Err(e) => {
                warn!("Cache read degraded to miss for {}: {}", key, e);
                self.counters.record_error();
                self.counters.record_miss();
                return Ok(None);
            }
        };

        match self.decode_value(&bytes, policy) {
            Ok(Some(found)) => {
                debug!("Cache hit: {}", key);
                self.counters.record_hit();
                Ok(Some(found))
            }
            Ok(None) => {
                debug!("Cache entry past its TTL: {}", key);
                self.counters.record_miss();
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.counters.record_error();
                self.counters.record_miss();
                Ok(None)
            }
        }
    }

    // == Set ==
    /// Stores `value`, returning whether the write landed.
    ///
    /// Expiry is `ttl_override` when given, otherwise the strategy TTL.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        strategy: &str,
        identifier: &str,
        value: &T,
        params: &[(&str, &str)],
        ttl_override: Option<Duration>,
    ) -> Result<bool> {
        let policy = self.strategies.get(strategy)?;
        let key = CacheKey::compose(strategy, identifier, params);
        let ttl = ttl_override.unwrap_or_else(|| policy.ttl());

        let entry = match self.encode_value(&key, value, policy, ttl) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cache write skipped for {}: {}", key, e);
                self.counters.record_set_failure();
                return Ok(false);
            }
        };
        let compressed = entry.compressed;

        let envelope = match entry.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cache write skipped for {}: {}", key, e);
                self.counters.record_set_failure();
                return Ok(false);
            }
        };

        let store_key = namespaced(&key);
        match with_timeout("set", self.timeout, self.store.set(&store_key, envelope, ttl)).await {
            Ok(()) => {
                debug!(
                    "Cached {} (ttl {}s, compressed: {})",
                    key,
                    ttl.as_secs(),
                    compressed
                );
                self.counters.record_set(compressed);
                self.notify_changed(strategy, identifier).await;
                Ok(true)
            }
            Err(e) => {
                warn!("Cache write failed for {}: {}", key, e);
                self.counters.record_error();
                self.counters.record_set_failure();
                Ok(false)
            }
        }
    }

    // == Delete ==
    pub async fn delete(
        &self,
        strategy: &str,
        identifier: &str,
        params: &[(&str, &str)],
    ) -> Result<bool> {
        let key = self.key_for(strategy, identifier, params)?;
        let store_key = namespaced(&key);

        match with_timeout("delete", self.timeout, self.store.delete(&store_key)).await {
            Ok(deleted) => {
                if deleted {
                    self.counters.record_delete();
                    self.notify_changed(strategy, identifier).await;
                }
                Ok(deleted)
            }
            Err(e) => {
                warn!("Cache delete failed for {}: {}", key, e);
                self.counters.record_error();
                Ok(false)
            }
        }
    }

    // == Invalidate ==
    /// Deletes every entry whose composed key matches the glob `pattern`
    /// (e.g. `*:user-42:*`). Repeated calls are safe and return 0.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let count = self.remove_matching(pattern).await;
        if count > 0 {
            if let Some(listener) = &self.listener {
                listener.entries_invalidated(pattern).await;
            }
        }
        count
    }

    /// Deletes `identifier`'s entries in every strategy listening for `trigger`.
    pub async fn invalidate_by_trigger(&self, trigger: &str, identifier: &str) -> usize {
        let mut total = 0;
        for strategy in self.strategies.triggered_by(trigger) {
            let count = self
                .remove_matching(&identifier_pattern(strategy, identifier))
                .await;
            if count > 0 {
                self.notify_changed(strategy, identifier).await;
            }
            total += count;
        }
        debug!(
            "Trigger {} for {} invalidated {} entries",
            trigger, identifier, total
        );
        total
    }

    async fn remove_matching(&self, pattern: &str) -> usize {
        let store_pattern = format!("{CACHE_NAMESPACE}{pattern}");

        match with_timeout(
            "delete_matching",
            self.timeout,
            self.store.delete_matching(&store_pattern),
        )
        .await
        {
            Ok(count) => {
                if count > 0 {
                    debug!("Invalidated {} entries matching {}", count, pattern);
                }
                self.counters.record_invalidations(count);
                count
            }
            Err(e) => {
                warn!("Invalidation of {} failed: {}", pattern, e);
                self.counters.record_error();
                0
            }
        }
    }

    // == Get Or Compute ==
    /// Returns the cached value, or runs `compute`, caches its output and
    /// returns it. Cache failures never fail the call; `compute` errors do.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        strategy: &str,
        identifier: &str,
        params: &[(&str, &str)],
        compute: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<T>>,
    {
        if let Some(value) = self.get(strategy, identifier, params).await? {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(strategy, identifier, &value, params, None).await?;
        Ok(value)
    }

    async fn notify_changed(&self, strategy: &str, identifier: &str) {
        if let Some(listener) = &self.listener {
            listener.entry_changed(strategy, identifier).await;
        }
    }

    pub fn metrics(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub async fn health_check(&self) -> ComponentHealth {
        let stats = self.metrics();
        match with_timeout("ping", self.timeout, self.store.ping()).await {
            Ok(()) => ComponentHealth::healthy(format!(
                "{} strategies, hit rate {:.1}%",
                self.strategies.len(),
                stats.hit_rate() * 100.0
            )),
            Err(e) => ComponentHealth::degraded(format!("store unreachable, serving misses: {}", e)),
        }
    }

    fn encode_value<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        policy: &CacheStrategy,
        ttl: Duration,
    ) -> Result<CacheEntry> {
        let serialized = match policy.serialization_format {
            SerializationFormat::Json => serde_json::to_vec(value)?,
            SerializationFormat::Binary => bincode::serialize(value)?,
        };

        let (payload, encoding) =
            if policy.compression_enabled && serialized.len() > COMPRESSION_THRESHOLD {
                let packed = self.compression.compress(&serialized);
                (packed.bytes, packed.encoding)
            } else {
                (serialized, Encoding::Identity)
            };

        Ok(CacheEntry::new(
            key.to_string(),
            payload,
            encoding,
            policy.serialization_format,
            ttl.as_secs().max(1),
        ))
    }

    /// The value and its remaining lifetime; `Ok(None)` when the envelope
    /// outlived its own TTL.
    fn decode_value<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
        policy: &CacheStrategy,
    ) -> Result<Option<(T, Duration)>> {
        let entry = CacheEntry::decode(bytes)?;
        let now = current_timestamp_ms();
        if entry.is_expired_at(now) {
            return Ok(None);
        }
        let remaining = Duration::from_millis(entry.expires_at() - now);
        if entry.format != policy.serialization_format {
            return Err(CacheError::Serialization(format!(
                "entry format {:?} does not match strategy format {:?}",
                entry.format, policy.serialization_format
            )));
        }

        let raw = if entry.compressed {
            self.compression.decompress(&entry.payload, entry.encoding)?
        } else {
            entry.payload
        };

        let value = match entry.format {
            SerializationFormat::Json => serde_json::from_slice(&raw)?,
            SerializationFormat::Binary => bincode::deserialize(&raw)?,
        };
        Ok(Some((value, remaining)))
    }
}

fn namespaced(key: &CacheKey) -> String {
    format!("{CACHE_NAMESPACE}{key}")
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStrategy;
    use crate::store::testing::{SlowStore, UnavailableStore};
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::{json, Value};

    fn cache_with(store: Arc<dyn KvStore>, timeout: Duration) -> CacheStore {
        let strategies = StrategyTable::builtin()
            .with("user", CacheStrategy::new(300))
            .with("report", CacheStrategy::new(300).compression(false));
        CacheStore::new(
            store,
            Arc::new(strategies),
            Arc::new(CompressionManager::default()),
            timeout,
        )
    }

    fn cache() -> (CacheStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new(1000));
        (cache_with(memory.clone(), Duration::from_secs(1)), memory)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Template {
        name: String,
        body: String,
        version: u32,
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (cache, _) = cache();
        let stored = cache
            .set("daily-summary", "user-7", &json!({"score": 42}), &[("date", "2024-01-01")], None)
            .await
            .unwrap();
        assert!(stored);

        let value: Option<Value> = cache
            .get("daily-summary", "user-7", &[("date", "2024-01-01")])
            .await
            .unwrap();
        assert_eq!(value, Some(json!({"score": 42})));

        let other: Option<Value> = cache
            .get("daily-summary", "user-7", &[("date", "2024-01-02")])
            .await
            .unwrap();
        assert_eq!(other, None);

        let stats = cache.metrics();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_an_error() {
        let (cache, _) = cache();
        let get: Result<Option<Value>> = cache.get("weekly-digest", "user-7", &[]).await;
        assert!(matches!(get, Err(CacheError::UnknownStrategy(_))));

        let set = cache.set("weekly-digest", "user-7", &1, &[], None).await;
        assert!(matches!(set, Err(CacheError::UnknownStrategy(_))));

        let delete = cache.delete("weekly-digest", "user-7", &[]).await;
        assert!(matches!(delete, Err(CacheError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn test_large_values_are_compressed() {
        let (cache, memory) = cache();
        let rows: Vec<Value> = (0..200)
            .map(|i| json!({"merchant": "Grocery Mart", "amount": 12.5, "day": i}))
            .collect();

        assert!(cache.set("user", "user-1", &rows, &[], None).await.unwrap());
        assert_eq!(cache.metrics().compressed_writes, 1);

        let raw = memory.get("cache:user:user-1:").await.unwrap().unwrap();
        let entry = CacheEntry::decode(&raw).unwrap();
        assert!(entry.compressed);
        assert_eq!(entry.encoding, Encoding::Gzip);
        assert!(entry.payload.len() < serde_json::to_vec(&rows).unwrap().len());

        let back: Vec<Value> = cache.get("user", "user-1", &[]).await.unwrap().unwrap();
        assert_eq!(back, rows);
    }

    #[tokio::test]
    async fn test_small_or_disabled_values_stay_uncompressed() {
        let (cache, memory) = cache();
        let big = "x".repeat(4096);

        cache.set("user", "small", &"tiny", &[], None).await.unwrap();
        cache.set("report", "big", &big, &[], None).await.unwrap();

        for key in ["cache:user:small:", "cache:report:big:"] {
            let entry = CacheEntry::decode(&memory.get(key).await.unwrap().unwrap()).unwrap();
            assert!(!entry.compressed);
            assert_eq!(entry.encoding, Encoding::Identity);
        }
        assert_eq!(cache.metrics().compressed_writes, 0);
    }

    #[tokio::test]
    async fn test_binary_strategy_roundtrip() {
        let (cache, _) = cache();
        let template = Template {
            name: "welcome".into(),
            body: "Hello {{name}}, your budget is ready.".repeat(60),
            version: 3,
        };

        assert!(cache.set("static-template", "welcome", &template, &[], None).await.unwrap());
        let back: Option<Template> = cache.get("static-template", "welcome", &[]).await.unwrap();
        assert_eq!(back, Some(template));
    }

    #[tokio::test]
    async fn test_type_mismatch_reads_as_miss() {
        let (cache, _) = cache();
        cache.set("user", "user-1", &json!({"score": "high"}), &[], None).await.unwrap();

        let wrong: Option<u32> = cache.get("user", "user-1", &[]).await.unwrap();
        assert_eq!(wrong, None);
        assert_eq!(cache.metrics().errors, 1);
    }

    #[tokio::test]
    async fn test_ttl_override() {
        let (cache, _) = cache();
        cache
            .set("daily-summary", "user-7", &1, &[], Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(cache.get::<u32>("daily-summary", "user-7", &[]).await.unwrap(), Some(1));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.get::<u32>("daily-summary", "user-7", &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let (cache, _) = cache();
        cache.set("user", "user-1", &1, &[], None).await.unwrap();

        assert!(cache.delete("user", "user-1", &[]).await.unwrap());
        assert!(!cache.delete("user", "user-1", &[]).await.unwrap());
        assert_eq!(cache.get::<u32>("user", "user-1", &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalidate_by_pattern_is_idempotent() {
        let (cache, _) = cache();
        cache.set("user", "42", &1, &[("date", "a")], None).await.unwrap();
        cache.set("user", "42", &2, &[("date", "b")], None).await.unwrap();
        cache.set("user", "42", &3, &[], None).await.unwrap();
        cache.set("user", "7", &4, &[], None).await.unwrap();

        assert_eq!(cache.invalidate_by_pattern("user:42:*").await, 3);
        assert_eq!(cache.invalidate_by_pattern("user:42:*").await, 0);

        assert_eq!(cache.get::<u32>("user", "42", &[("date", "a")]).await.unwrap(), None);
        assert_eq!(cache.get::<u32>("user", "7", &[]).await.unwrap(), Some(4));
        assert_eq!(cache.metrics().invalidations, 3);
    }

    #[tokio::test]
    async fn test_invalidation_spares_etag_records() {
        let (cache, memory) = cache();
        memory
            .set("etag:/forecast", b"\"abc\"".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.set("user", "1", &1, &[], None).await.unwrap();

        assert_eq!(cache.invalidate_by_pattern("*").await, 1);
        assert!(memory.get("etag:/forecast").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_by_trigger() {
        let (cache, _) = cache();
        cache.set("daily-summary", "user-9", &1, &[("date", "d")], None).await.unwrap();
        cache.set("user-score", "user-9", &2, &[], None).await.unwrap();
        cache.set("peer-aggregate", "user-9", &3, &[], None).await.unwrap();
        cache.set("user-score", "user-10", &4, &[], None).await.unwrap();

        assert_eq!(cache.invalidate_by_trigger("transaction_created", "user-9").await, 2);

        assert_eq!(cache.get::<u32>("user-score", "user-9", &[]).await.unwrap(), None);
        assert_eq!(cache.get::<u32>("peer-aggregate", "user-9", &[]).await.unwrap(), Some(3));
        assert_eq!(cache.get::<u32>("user-score", "user-10", &[]).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_params_with_separators_do_not_collide() {
        let (cache, _) = cache();
        cache
            .set(
                "daily-summary",
                "user-7",
                &json!({"owner": "A"}),
                &[("date", "2024-01-01&note=x")],
                None,
            )
            .await
            .unwrap();

        let other: Option<Value> = cache
            .get("daily-summary", "user-7", &[("note", "x"), ("date", "2024-01-01")])
            .await
            .unwrap();
        assert_eq!(other, None);

        let own: Option<Value> = cache
            .get("daily-summary", "user-7", &[("date", "2024-01-01&note=x")])
            .await
            .unwrap();
        assert_eq!(own, Some(json!({"owner": "A"})));
    }

    #[tokio::test]
    async fn test_trigger_with_glob_identifier_is_literal() {
        let (cache, _) = cache();
        cache.set("user-score", "user-1", &1, &[], None).await.unwrap();
        cache.set("user-score", "user-2", &2, &[], None).await.unwrap();

        assert_eq!(cache.invalidate_by_trigger("goal_updated", "user-*").await, 0);
        assert_eq!(cache.invalidate_by_trigger("goal_updated", "user-?").await, 0);

        assert_eq!(cache.get::<u32>("user-score", "user-1", &[]).await.unwrap(), Some(1));
        assert_eq!(cache.get::<u32>("user-score", "user-2", &[]).await.unwrap(), Some(2));

        cache.set("user-score", "user-*", &3, &[], None).await.unwrap();
        assert_eq!(cache.invalidate_by_trigger("goal_updated", "user-*").await, 1);
        assert_eq!(cache.get::<u32>("user-score", "user-1", &[]).await.unwrap(), Some(1));
    }

    #[derive(Default)]
    struct RecordingListener {
        events: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CacheListener for RecordingListener {
        async fn entry_changed(&self, strategy: &str, identifier: &str) {
            self.events.lock().unwrap().push(format!("changed {strategy}/{identifier}"));
        }

        async fn entries_invalidated(&self, pattern: &str) {
            self.events.lock().unwrap().push(format!("invalidated {pattern}"));
        }
    }

    #[tokio::test]
    async fn test_listener_hears_every_change() {
        let listener = Arc::new(RecordingListener::default());
        let (cache, _) = cache();
        let cache = cache.with_listener(listener.clone());

        cache.set("user-score", "user-1", &1, &[], None).await.unwrap();
        cache.set("user-score", "user-2", &2, &[], None).await.unwrap();
        cache.delete("user-score", "user-1", &[]).await.unwrap();
        // Nothing removed, nothing reported
        cache.delete("user-score", "user-1", &[]).await.unwrap();
        cache.invalidate_by_trigger("goal_updated", "user-2").await;
        cache.set("user", "42", &3, &[], None).await.unwrap();
        cache.invalidate_by_pattern("user:42:*").await;
        cache.invalidate_by_pattern("user:42:*").await;

        assert_eq!(
            listener.events(),
            vec![
                "changed user-score/user-1",
                "changed user-score/user-2",
                "changed user-score/user-1",
                "changed user-score/user-2",
                "changed user/42",
                "invalidated user:42:*",
            ]
        );
    }

    #[tokio::test]
    async fn test_get_with_ttl_reports_remaining_lifetime() {
        let (cache, _) = cache();
        cache
            .set("user-score", "user-1", &1, &[], Some(Duration::from_secs(30)))
            .await
            .unwrap();

        let (value, remaining): (u32, Duration) = cache
            .get_with_ttl("user-score", "user-1", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 1);
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_get_or_compute() {
        let (cache, _) = cache();
        let first = cache
            .get_or_compute("user-score", "user-3", &[], || async { Ok(710u32) })
            .await
            .unwrap();
        let second: u32 = cache
            .get_or_compute("user-score", "user-3", &[], || async {
                anyhow::bail!("must not recompute")
            })
            .await
            .unwrap();

        assert_eq!(first, 710);
        assert_eq!(second, 710);
    }

    #[tokio::test]
    async fn test_store_outage_fails_soft() {
        let cache = cache_with(Arc::new(UnavailableStore), Duration::from_secs(1));

        assert_eq!(cache.get::<u32>("user", "1", &[]).await.unwrap(), None);
        assert!(!cache.set("user", "1", &1, &[], None).await.unwrap());
        assert!(!cache.delete("user", "1", &[]).await.unwrap());
        assert_eq!(cache.invalidate_by_pattern("user:1:*").await, 0);

        let stats = cache.metrics();
        assert_eq!(stats.errors, 4);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.set_failures, 1);
        assert!(!cache.health_check().await.is_healthy());
    }

    #[tokio::test]
    async fn test_store_timeout_fails_soft() {
        let cache = cache_with(Arc::new(SlowStore), Duration::from_millis(50));

        let started = std::time::Instant::now();
        assert_eq!(cache.get::<u32>("user", "1", &[]).await.unwrap(), None);
        assert!(!cache.set("user", "1", &1, &[], None).await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_health_check_healthy() {
        let (cache, _) = cache();
        assert!(cache.health_check().await.is_healthy());
    }
}
