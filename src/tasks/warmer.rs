//! Cache Warmer
//!
//! Pre-populates the cache ahead of demand. Identifiers are processed in
//! batches with a pause between batches; inside a batch a bounded pool of
//! workers generates values and writes them through [`CacheStore::set`].
//! A failing identifier is retried with exponential backoff and then
//! recorded as failed without affecting the rest of the run.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::Result;
use crate::health::ComponentHealth;

/// Longest pause between two attempts for one identifier.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

// == Warm Source ==
/// Supplies what to warm for one strategy.
#[async_trait]
pub trait WarmSource: Send + Sync + 'static {
    type Value: Serialize + Send + Sync + 'static;

    /// Identifiers to warm on a scheduled run.
    async fn identifiers(&self) -> anyhow::Result<Vec<String>>;

    /// Computes the value cached for `identifier`.
    async fn generate(&self, identifier: &str) -> anyhow::Result<Self::Value>;

    /// Extra key parameters for `identifier`'s entry.
    fn params(&self, _identifier: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

// == Warm Config ==
#[derive(Debug, Clone)]
pub struct WarmConfig {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt up to 5s
    pub retry_base: Duration,
    pub workers: usize,
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(100),
            max_retries: 3,
            retry_base: Duration::from_millis(200),
            workers: 4,
        }
    }
}

impl WarmConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.warm_batch_size.max(1),
            batch_delay: Duration::from_millis(config.warm_batch_delay_ms),
            max_retries: config.warm_max_retries,
            retry_base: Duration::from_millis(config.warm_retry_base_ms),
            workers: config.warm_workers.clamp(1, 8),
        }
    }

    /// Pause after the `attempt`-th failure (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

// == Warm Report ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub strategy: String,
    /// Per-identifier outcome
    pub results: BTreeMap<String, bool>,
    pub duration_ms: u64,
}

impl WarmReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmerStats {
    pub runs: u64,
    pub warmed: u64,
    pub failed: u64,
    pub retries: u64,
}

#[derive(Debug, Default)]
struct WarmerCounters {
    runs: AtomicU64,
    warmed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    /// Last run had identifiers and none of them succeeded
    last_run_failed: AtomicBool,
}

// == Cache Warmer ==
pub struct CacheWarmer {
    cache: Arc<CacheStore>,
    config: WarmConfig,
    workers: Arc<Semaphore>,
    counters: Arc<WarmerCounters>,
}

impl CacheWarmer {
    pub fn new(cache: Arc<CacheStore>, config: WarmConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.workers.clamp(1, 8)));
        Self {
            cache,
            config,
            workers,
            counters: Arc::new(WarmerCounters::default()),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &WarmConfig {
        &self.config
    }

    // == Warm ==
    /// Warms `identifiers` for `strategy` with values from `source`.
    ///
    /// Fails only when `strategy` is unknown; individual identifiers report
    /// their outcome in the returned map.
    pub async fn warm<S: WarmSource>(
        &self,
        strategy: &str,
        source: Arc<S>,
        identifiers: Vec<String>,
    ) -> Result<WarmReport> {
        self.cache.strategies().get(strategy)?;

        let started = Instant::now();
        let mut results = BTreeMap::new();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = identifiers.len().div_ceil(batch_size);
        info!(
            "Warming {} identifiers for {} in {} batches",
            identifiers.len(),
            strategy,
            batch_count
        );

        for (index, batch) in identifiers.chunks(batch_size).enumerate() {
            if index > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            // Anything that never reports back counts as failed
            for identifier in batch {
                results.insert(identifier.clone(), false);
            }

            let mut tasks = JoinSet::new();
            for identifier in batch {
                let workers = self.workers.clone();
                let unit = WarmUnit {
                    cache: self.cache.clone(),
                    source: source.clone(),
                    counters: self.counters.clone(),
                    config: self.config.clone(),
                    strategy: strategy.to_string(),
                    identifier: identifier.clone(),
                };

                tasks.spawn(async move {
                    let Ok(_permit) = workers.acquire_owned().await else {
                        return (unit.identifier, false);
                    };
                    let ok = unit.run().await;
                    (unit.identifier, ok)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((identifier, ok)) => {
                        results.insert(identifier, ok);
                    }
                    Err(e) => error!("Warming task for {} aborted: {}", strategy, e),
                }
            }
            debug!("Finished warming batch {}/{} for {}", index + 1, batch_count, strategy);
        }

        let report = WarmReport {
            strategy: strategy.to_string(),
            results,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.record_run(&report);

        info!(
            "Warmed {} for {}: {} ok, {} failed in {}ms",
            report.results.len(),
            strategy,
            report.succeeded(),
            report.failed(),
            report.duration_ms
        );
        Ok(report)
    }

    pub fn metrics(&self) -> WarmerStats {
        WarmerStats {
            runs: self.counters.runs.load(Ordering::Relaxed),
            warmed: self.counters.warmed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    pub fn health_check(&self) -> ComponentHealth {
        let stats = self.metrics();
        let detail = format!(
            "{} runs, {} warmed, {} failed, {} workers",
            stats.runs, stats.warmed, stats.failed, self.config.workers
        );
        if self.counters.last_run_failed.load(Ordering::Relaxed) {
            ComponentHealth::degraded(format!("last run warmed nothing; {}", detail))
        } else {
            ComponentHealth::healthy(detail)
        }
    }

    fn record_run(&self, report: &WarmReport) {
        self.counters.runs.fetch_add(1, Ordering::Relaxed);
        self.counters
            .warmed
            .fetch_add(report.succeeded() as u64, Ordering::Relaxed);
        self.counters
            .failed
            .fetch_add(report.failed() as u64, Ordering::Relaxed);
        self.counters.last_run_failed.store(
            !report.results.is_empty() && report.succeeded() == 0,
            Ordering::Relaxed,
        );
    }
}

/// One identifier's warming work, owned by its worker task.
struct WarmUnit<S> {
    cache: Arc<CacheStore>,
    source: Arc<S>,
    counters: Arc<WarmerCounters>,
    config: WarmConfig,
    strategy: String,
    identifier: String,
}

impl<S: WarmSource> WarmUnit<S> {
    async fn run(&self) -> bool {
        let params = self.source.params(&self.identifier);
        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }

            match self.attempt(&params).await {
                Ok(()) => return true,
                Err(e) => warn!(
                    "Warming {}/{} failed (attempt {}/{}): {}",
                    self.strategy,
                    self.identifier,
                    attempt + 1,
                    self.config.max_retries + 1,
                    e
                ),
            }
        }

        error!(
            "Giving up warming {}/{} after {} attempts",
            self.strategy,
            self.identifier,
            self.config.max_retries + 1
        );
        false
    }

    async fn attempt(&self, params: &[(&str, &str)]) -> anyhow::Result<()> {
        let value = self.source.generate(&self.identifier).await?;
        let stored = self
            .cache
            .set(&self.strategy, &self.identifier, &value, params, None)
            .await?;
        anyhow::ensure!(stored, "cache write was not accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StrategyTable;
    use crate::compression::CompressionManager;
    use crate::error::CacheError;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn cache() -> Arc<CacheStore> {
        Arc::new(CacheStore::new(
            Arc::new(MemoryStore::new(1000)),
            Arc::new(StrategyTable::builtin()),
            Arc::new(CompressionManager::default()),
            Duration::from_secs(1),
        ))
    }

    fn fast_config() -> WarmConfig {
        WarmConfig {
            batch_size: 2,
            batch_delay: Duration::ZERO,
            max_retries: 2,
            retry_base: Duration::from_millis(1),
            workers: 2,
        }
    }

    /// Fails for listed identifiers a set number of times before succeeding.
    #[derive(Default)]
    struct Summaries {
        failures_left: Mutex<HashMap<String, u32>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Summaries {
        fn failing(id: &str, times: u32) -> Self {
            let source = Self::default();
            source
                .failures_left
                .lock()
                .unwrap()
                .insert(id.to_string(), times);
            source
        }
    }

    #[async_trait]
    impl WarmSource for Summaries {
        type Value = Value;

        async fn identifiers(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["user-1".into(), "user-2".into()])
        }

        async fn generate(&self, identifier: &str) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut failures = self.failures_left.lock().unwrap();
            if let Some(left) = failures.get_mut(identifier) {
                if *left > 0 {
                    *left -= 1;
                    anyhow::bail!("ledger unavailable for {}", identifier);
                }
            }
            Ok(json!({ "user": identifier, "score": 42 }))
        }

        fn params(&self, _identifier: &str) -> Vec<(String, String)> {
            vec![("date".to_string(), "2024-01-01".to_string())]
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("user-{}", i)).collect()
    }

    #[tokio::test]
    async fn test_warm_populates_cache() {
        let cache = cache();
        let warmer = CacheWarmer::new(cache.clone(), fast_config());

        let report = warmer
            .warm("daily-summary", Arc::new(Summaries::default()), ids(5))
            .await
            .unwrap();

        assert_eq!(report.results.len(), 5);
        assert_eq!(report.succeeded(), 5);

        let cached: Option<Value> = cache
            .get("daily-summary", "user-3", &[("date", "2024-01-01")])
            .await
            .unwrap();
        assert_eq!(cached, Some(json!({"user": "user-3", "score": 42})));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let warmer = CacheWarmer::new(cache(), fast_config());
        let source = Arc::new(Summaries::failing("user-2", 10));

        let report = warmer.warm("daily-summary", source.clone(), ids(4)).await.unwrap();

        assert!(!report.results["user-2"]);
        assert!(report.results["user-1"] && report.results["user-3"] && report.results["user-4"]);
        // 3 healthy calls plus 1 + max_retries for the failing one
        assert_eq!(source.calls.load(Ordering::SeqCst), 3 + 3);

        let stats = warmer.metrics();
        assert_eq!((stats.warmed, stats.failed, stats.retries), (3, 1, 2));
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let warmer = CacheWarmer::new(cache(), fast_config());
        let source = Arc::new(Summaries::failing("user-1", 2));

        let report = warmer.warm("daily-summary", source, ids(1)).await.unwrap();
        assert!(report.results["user-1"]);
        assert_eq!(warmer.metrics().retries, 2);
    }

    #[tokio::test]
    async fn test_workers_are_bounded() {
        let config = WarmConfig {
            batch_size: 20,
            workers: 3,
            ..fast_config()
        };
        let warmer = CacheWarmer::new(cache(), config);
        let source = Arc::new(Summaries::default());

        warmer.warm("daily-summary", source.clone(), ids(20)).await.unwrap();
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_unknown_strategy_fails_loudly() {
        let warmer = CacheWarmer::new(cache(), fast_config());
        let result = warmer.warm("weekly-digest", Arc::new(Summaries::default()), ids(1)).await;
        assert!(matches!(result, Err(CacheError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn test_health_degrades_when_nothing_warms() {
        let warmer = CacheWarmer::new(cache(), fast_config());
        assert!(warmer.health_check().is_healthy());

        warmer
            .warm("daily-summary", Arc::new(Summaries::failing("user-1", 10)), ids(1))
            .await
            .unwrap();
        assert!(!warmer.health_check().is_healthy());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = WarmConfig {
            retry_base: Duration::from_millis(200),
            ..WarmConfig::default()
        };
        assert_eq!(config.backoff(0), Duration::from_millis(200));
        assert_eq!(config.backoff(1), Duration::from_millis(400));
        assert_eq!(config.backoff(3), Duration::from_millis(1600));
        assert_eq!(config.backoff(10), MAX_BACKOFF);
        assert_eq!(config.backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn test_from_config_clamps_workers() {
        let mut config = Config::default();
        config.warm_workers = 32;
        config.warm_batch_size = 0;
        let warm = WarmConfig::from_config(&config);
        assert_eq!(warm.workers, 8);
        assert_eq!(warm.batch_size, 1);
    }
}
