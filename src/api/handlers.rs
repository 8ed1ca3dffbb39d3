//! API Handlers
//!
//! HTTP request handlers for each endpoint, plus the shared application
//! state that wires the caching components together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheListener, CacheStore, StrategyTable};
use crate::compression::{CompressionConfig, CompressionManager};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::etag::ConditionalCacheManager;
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    InvalidationTarget, SetRequest, SetResponse, StatsResponse,
};
use crate::pipeline::{CompressionStage, ConditionalStage, Pipeline, RateLimitStage};
use crate::ratelimit::RateLimiter;
use crate::store::{escape_glob, MemoryStore};
use crate::tasks::{CacheWarmer, WarmConfig};

/// ETag records of every cache resource.
const CACHE_ETAG_PATTERN: &str = "/cache/*";

// == Cache Route Tags ==
/// Drops the recorded tags of `/cache/...` resources whenever the entries
/// behind them change, including writes made by the warmer or by triggers.
pub struct CacheRouteTags {
    etags: Arc<ConditionalCacheManager>,
}

impl CacheRouteTags {
    pub fn new(etags: Arc<ConditionalCacheManager>) -> Self {
        Self { etags }
    }
}

#[async_trait]
impl CacheListener for CacheRouteTags {
    async fn entry_changed(&self, strategy: &str, identifier: &str) {
        let pattern = resource_tag_pattern(strategy, identifier);
        let dropped = self.etags.invalidate_matching(&pattern).await;
        if dropped > 0 {
            debug!("Dropped {} tags for {}/{}", dropped, strategy, identifier);
        }
    }

    async fn entries_invalidated(&self, _pattern: &str) {
        // Keys do not map back to URLs, so every cache resource tag goes
        self.etags.invalidate_matching(CACHE_ETAG_PATTERN).await;
    }
}

/// Tag records of one identifier's resources under `strategy`.
///
/// Tags are keyed by the request path as sent, so an identifier that needs
/// percent-encoding widens the pattern to the whole strategy.
fn resource_tag_pattern(strategy: &str, identifier: &str) -> String {
    let strategy = escape_glob(strategy);
    if urlencoding::encode(identifier) != identifier {
        return format!("/cache/{}/*", strategy);
    }
    format!("/cache/{}/{}\\?*", strategy, identifier)
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Backing store shared by every component
    pub store: Arc<MemoryStore>,
    pub cache: Arc<CacheStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub etags: Arc<ConditionalCacheManager>,
    pub compression: Arc<CompressionManager>,
    pub warmer: Arc<CacheWarmer>,
    /// Rate-limit, conditional and compression stages, in that order
    pub pipeline: Pipeline,
}

impl AppState {
    /// Wires every component over one in-memory store.
    pub fn new(config: &Config, strategies: StrategyTable) -> Self {
        let store = Arc::new(MemoryStore::new(config.store_max_entries));
        let timeout = config.store_timeout();

        let compression = Arc::new(CompressionManager::new(CompressionConfig {
            min_size: config.compression_min_size,
            level: config.compression_level,
            ..CompressionConfig::default()
        }));
        let etags = Arc::new(ConditionalCacheManager::new(
            store.clone(),
            Duration::from_secs(config.etag_ttl),
            timeout,
        ));
        let cache = Arc::new(
            CacheStore::new(store.clone(), Arc::new(strategies), compression.clone(), timeout)
                .with_listener(Arc::new(CacheRouteTags::new(etags.clone()))),
        );
        let rate_limiter = Arc::new(RateLimiter::new(
            store.clone(),
            config.rate_limit_config(),
            timeout,
        ));
        let warmer = Arc::new(CacheWarmer::new(
            cache.clone(),
            WarmConfig::from_config(config),
        ));

        let pipeline = Pipeline::new()
            .stage(Arc::new(RateLimitStage::new(rate_limiter.clone())))
            .stage(Arc::new(ConditionalStage::new(etags.clone())))
            .stage(Arc::new(CompressionStage::new(compression.clone())));

        Self {
            store,
            cache,
            rate_limiter,
            etags,
            compression,
            warmer,
            pipeline,
        }
    }

    /// Creates the state from configuration, loading the strategy table from
    /// `STRATEGY_TABLE_PATH` when set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let strategies = match &config.strategy_table_path {
            Some(path) => {
                info!("Loading strategy table from {}", path.display());
                StrategyTable::load(path)?
            }
            None => StrategyTable::builtin(),
        };
        strategies.validate()?;
        Ok(Self::new(config, strategies))
    }
}

/// Handler for PUT /cache/:strategy/:identifier
pub async fn set_handler(
    State(state): State<AppState>,
    Path((strategy, identifier)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let stored = state
        .cache
        .set(
            &strategy,
            &identifier,
            &req.value,
            &borrowed(&params),
            req.ttl.map(Duration::from_secs),
        )
        .await?;

    Ok(Json(SetResponse {
        strategy,
        identifier,
        stored,
    }))
}

/// Handler for GET /cache/:strategy/:identifier
///
/// `Cache-Control: max-age` carries the entry's remaining lifetime.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((strategy, identifier)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<([(header::HeaderName, String); 1], Json<GetResponse>)> {
    let found: Option<(Value, Duration)> = state
        .cache
        .get_with_ttl(&strategy, &identifier, &borrowed(&params))
        .await?;

    match found {
        Some((value, remaining)) => Ok((
            [(header::CACHE_CONTROL, format!("max-age={}", remaining.as_secs()))],
            Json(GetResponse {
                strategy,
                identifier,
                value,
            }),
        )),
        None => Err(CacheError::NotFound(format!("{}/{}", strategy, identifier))),
    }
}

/// Handler for DELETE /cache/:strategy/:identifier
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((strategy, identifier)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state
        .cache
        .delete(&strategy, &identifier, &borrowed(&params))
        .await?;

    if !deleted {
        return Err(CacheError::NotFound(format!("{}/{}", strategy, identifier)));
    }
    Ok(Json(DeleteResponse::new(strategy, identifier)))
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    // Matching tags are dropped by the cache's listener
    let deleted = match req.target().map_err(CacheError::InvalidRequest)? {
        InvalidationTarget::Pattern(pattern) => state.cache.invalidate_by_pattern(&pattern).await,
        InvalidationTarget::Trigger {
            trigger,
            identifier,
        } => state.cache.invalidate_by_trigger(&trigger, &identifier).await,
    };

    Ok(Json(InvalidateResponse { deleted }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.metrics();
    Json(StatsResponse {
        hit_rate: cache.hit_rate(),
        cache,
        rate_limiter: state.rate_limiter.metrics(),
        etag: state.etags.metrics(),
        compression: state.compression.metrics(),
        warmer: state.warmer.metrics(),
        store: state.store.stats().await,
    })
}

/// Handler for GET /health
///
/// Answers 503 when any component is unhealthy; degraded components still
/// answer 200.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut components = BTreeMap::new();
    components.insert("cache".to_string(), state.cache.health_check().await);
    components.insert(
        "rate_limiter".to_string(),
        state.rate_limiter.health_check().await,
    );
    components.insert("etag".to_string(), state.etags.health_check().await);
    components.insert("compression".to_string(), state.compression.health_check());
    components.insert("warmer".to_string(), state.warmer.health_check());

    let response = HealthResponse::from_components(components);
    let status = match response.status {
        crate::health::HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(response))
}

fn borrowed(params: &[(String, String)]) -> Vec<(&str, &str)> {
    params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}
