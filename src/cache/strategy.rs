//! Cache Strategy Module
//!
//! Named, fixed bundles of cache policy. Every cache operation names exactly
//! one strategy; TTL, compression and format are never chosen per call.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    Json,
    /// bincode; only for concrete types (not `serde_json::Value`)
    Binary,
}

// == Cache Strategy ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStrategy {
    pub ttl_seconds: u64,
    #[serde(default = "default_compression")]
    pub compression_enabled: bool,
    #[serde(default)]
    pub serialization_format: SerializationFormat,
    #[serde(default)]
    pub warm_on_startup: bool,
    /// Business events that invalidate this strategy's entries for a subject
    #[serde(default)]
    pub invalidation_triggers: BTreeSet<String>,
}

fn default_compression() -> bool {
    true
}

impl CacheStrategy {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            compression_enabled: true,
            serialization_format: SerializationFormat::Json,
            warm_on_startup: false,
            invalidation_triggers: BTreeSet::new(),
        }
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression_enabled = enabled;
        self
    }

    pub fn format(mut self, format: SerializationFormat) -> Self {
        self.serialization_format = format;
        self
    }

    pub fn warm_on_startup(mut self, warm: bool) -> Self {
        self.warm_on_startup = warm;
        self
    }

    pub fn triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invalidation_triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

// == Strategy Table ==
/// Strategy name to policy mapping, fixed at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyTable {
    strategies: HashMap<String, CacheStrategy>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The strategies the finance backend ships with.
    pub fn builtin() -> Self {
        Self::new()
            .with(
                "daily-summary",
                CacheStrategy::new(86_400)
                    .warm_on_startup(true)
                    .triggers(["transaction_created", "account_synced"]),
            )
            .with(
                "user-score",
                CacheStrategy::new(3_600)
                    .compression(false)
                    .triggers(["transaction_created", "goal_updated", "account_synced"]),
            )
            .with(
                "static-template",
                CacheStrategy::new(604_800)
                    .format(SerializationFormat::Binary)
                    .warm_on_startup(true),
            )
            .with(
                "peer-aggregate",
                CacheStrategy::new(21_600)
                    .warm_on_startup(true)
                    .triggers(["peer_stats_rebuilt"]),
            )
            .with(
                "market-data",
                CacheStrategy::new(300).triggers(["market_refresh"]),
            )
    }

    /// Parses a JSON object of `name -> strategy`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: StrategyTable = serde_json::from_str(raw).map_err(|e| {
            CacheError::InvalidConfiguration(format!("strategy table: {}", e))
        })?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CacheError::InvalidConfiguration(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn with(mut self, name: impl Into<String>, strategy: CacheStrategy) -> Self {
        self.strategies.insert(name.into(), strategy);
        self
    }

    /// Looks a strategy up; an unknown name is a caller bug and fails loudly.
    pub fn get(&self, name: &str) -> Result<&CacheStrategy> {
        self.strategies
            .get(name)
            .ok_or_else(|| CacheError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Sorted strategy names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Names of strategies invalidated by `trigger`, sorted.
    pub fn triggered_by(&self, trigger: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .strategies
            .iter()
            .filter(|(_, s)| s.invalidation_triggers.contains(trigger))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, strategy) in &self.strategies {
            if name.is_empty() || name.contains(|c: char| matches!(c, ':' | '*' | '?')) {
                return Err(CacheError::InvalidConfiguration(format!(
                    "strategy name '{}' must be non-empty and free of ':', '*', '?'",
                    name
                )));
            }
            if strategy.ttl_seconds == 0 {
                return Err(CacheError::InvalidConfiguration(format!(
                    "strategy '{}' has a zero TTL",
                    name
                )));
            }
        }
        Ok(())
    }
}
