//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::ratelimit::{FailurePolicy, RateLimitConfig};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries the in-memory store can hold
    pub store_max_entries: usize,
    /// Deadline applied to every store round-trip, in milliseconds
    pub store_timeout_ms: u64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Sliding window length in seconds
    pub rate_limit_window: u64,
    /// Limit for resources missing from the endpoint table
    pub rate_limit_default: u32,
    /// Per-tier limits
    pub rate_limit_tiers: HashMap<String, u32>,
    /// Per-endpoint limits
    pub rate_limit_endpoints: HashMap<String, u32>,
    /// Deny requests when the window store is down
    pub rate_limit_fail_closed: bool,
    /// Smallest payload the compressor will touch
    pub compression_min_size: usize,
    /// Compression level (0-9)
    pub compression_level: u32,
    /// Lifetime of stored ETag records in seconds
    pub etag_ttl: u64,
    /// Identifiers per warming batch
    pub warm_batch_size: usize,
    /// Pause between warming batches in milliseconds
    pub warm_batch_delay_ms: u64,
    /// Retries per failed warming unit
    pub warm_max_retries: u32,
    /// Backoff base for warming retries in milliseconds
    pub warm_retry_base_ms: u64,
    /// Concurrent warming workers (1..=8)
    pub warm_workers: usize,
    /// Optional JSON strategy table replacing the built-in one
    pub strategy_table_path: Option<PathBuf>,
}

const DEFAULT_TIERS: &str = "free=60,basic=300,premium=1000,enterprise=5000";
const DEFAULT_ENDPOINTS: &str = "/forecast=10,/score=30";

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STORE_MAX_ENTRIES` - In-memory store capacity (default: 10000)
    /// - `STORE_TIMEOUT_MS` - Store call deadline (default: 2000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 5)
    /// - `RATE_LIMIT_WINDOW` - Window seconds (default: 60)
    /// - `RATE_LIMIT_DEFAULT` - Default endpoint limit (default: 100)
    /// - `RATE_LIMIT_TIERS` - `tier=limit,...` (default: free=60,basic=300,premium=1000,enterprise=5000)
    /// - `RATE_LIMIT_ENDPOINTS` - `path=limit,...` (default: /forecast=10,/score=30)
    /// - `RATE_LIMIT_FAIL_CLOSED` - Deny on store outage (default: false)
    /// - `COMPRESSION_MIN_SIZE` - Compression threshold bytes (default: 1024)
    /// - `COMPRESSION_LEVEL` - Compression level (default: 6)
    /// - `ETAG_TTL` - ETag record lifetime seconds (default: 3600)
    /// - `WARM_BATCH_SIZE` / `WARM_BATCH_DELAY_MS` / `WARM_MAX_RETRIES` /
    ///   `WARM_RETRY_BASE_MS` / `WARM_WORKERS` - cache warming knobs
    /// - `STRATEGY_TABLE_PATH` - JSON strategy table (default: built-in table)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            store_max_entries: env_or("STORE_MAX_ENTRIES", defaults.store_max_entries),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            rate_limit_window: env_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window),
            rate_limit_default: env_or("RATE_LIMIT_DEFAULT", defaults.rate_limit_default),
            rate_limit_tiers: env::var("RATE_LIMIT_TIERS")
                .ok()
                .map(|v| parse_limit_table(&v))
                .unwrap_or(defaults.rate_limit_tiers),
            rate_limit_endpoints: env::var("RATE_LIMIT_ENDPOINTS")
                .ok()
                .map(|v| parse_limit_table(&v))
                .unwrap_or(defaults.rate_limit_endpoints),
            rate_limit_fail_closed: env_or(
                "RATE_LIMIT_FAIL_CLOSED",
                defaults.rate_limit_fail_closed,
            ),
            compression_min_size: env_or("COMPRESSION_MIN_SIZE", defaults.compression_min_size),
            compression_level: env_or("COMPRESSION_LEVEL", defaults.compression_level).min(9),
            etag_ttl: env_or("ETAG_TTL", defaults.etag_ttl),
            warm_batch_size: env_or("WARM_BATCH_SIZE", defaults.warm_batch_size).max(1),
            warm_batch_delay_ms: env_or("WARM_BATCH_DELAY_MS", defaults.warm_batch_delay_ms),
            warm_max_retries: env_or("WARM_MAX_RETRIES", defaults.warm_max_retries),
            warm_retry_base_ms: env_or("WARM_RETRY_BASE_MS", defaults.warm_retry_base_ms),
            warm_workers: env_or("WARM_WORKERS", defaults.warm_workers).clamp(1, 8),
            strategy_table_path: env::var("STRATEGY_TABLE_PATH").ok().map(PathBuf::from),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Builds the rate limiter tables from this configuration.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_secs(self.rate_limit_window),
            default_limit: self.rate_limit_default,
            tier_limits: self.rate_limit_tiers.clone(),
            endpoint_limits: self.rate_limit_endpoints.clone(),
            failure_policy: if self.rate_limit_fail_closed {
                FailurePolicy::FailClosed
            } else {
                FailurePolicy::FailOpen
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            store_max_entries: 10_000,
            store_timeout_ms: 2000,
            cleanup_interval: 5,
            rate_limit_window: 60,
            rate_limit_default: 100,
            rate_limit_tiers: parse_limit_table(DEFAULT_TIERS),
            rate_limit_endpoints: parse_limit_table(DEFAULT_ENDPOINTS),
            rate_limit_fail_closed: false,
            compression_min_size: 1024,
            compression_level: 6,
            etag_ttl: 3600,
            warm_batch_size: 10,
            warm_batch_delay_ms: 100,
            warm_max_retries: 3,
            warm_retry_base_ms: 200,
            warm_workers: 4,
            strategy_table_path: None,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses `name=limit,name=limit` pairs, skipping malformed items.
pub fn parse_limit_table(raw: &str) -> HashMap<String, u32> {
    raw.split(',')
        .filter_map(|item| {
            let (name, limit) = item.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), limit.trim().parse().ok()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.store_timeout_ms, 2000);
        assert_eq!(config.compression_min_size, 1024);
        assert_eq!(config.rate_limit_tiers.get("free"), Some(&60));
        assert_eq!(config.rate_limit_endpoints.get("/forecast"), Some(&10));
        assert!(!config.rate_limit_fail_closed);
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("SERVER_PORT");
        env::remove_var("WARM_WORKERS");
        env::remove_var("RATE_LIMIT_TIERS");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.warm_workers, 4);
        assert_eq!(config.rate_limit_tiers.len(), 4);
    }

    #[test]
    fn test_parse_limit_table() {
        let table = parse_limit_table("free=10, premium = 500,broken,=3,bad=x");
        assert_eq!(table.len(), 2);
        assert_eq!(table["free"], 10);
        assert_eq!(table["premium"], 500);
    }

    #[test]
    fn test_rate_limit_config_policy() {
        let mut config = Config::default();
        assert_eq!(config.rate_limit_config().failure_policy, FailurePolicy::FailOpen);

        config.rate_limit_fail_closed = true;
        let rl = config.rate_limit_config();
        assert_eq!(rl.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(rl.window, Duration::from_secs(60));
    }
}
