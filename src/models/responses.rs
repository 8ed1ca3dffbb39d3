//! Response DTOs for the HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::compression::CompressionStats;
use crate::etag::EtagStats;
use crate::health::{ComponentHealth, HealthStatus};
use crate::ratelimit::RateLimitStats;
use crate::store::MemoryStoreStats;
use crate::tasks::WarmerStats;

/// Response body for `GET /cache/:strategy/:identifier`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub strategy: String,
    pub identifier: String,
    pub value: Value,
}

/// Response body for `PUT /cache/:strategy/:identifier`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub strategy: String,
    pub identifier: String,
    /// False when the write was dropped (store down, value unserializable)
    pub stored: bool,
}

/// Response body for `DELETE /cache/:strategy/:identifier`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub strategy: String,
    pub identifier: String,
}

impl DeleteResponse {
    pub fn new(strategy: impl Into<String>, identifier: impl Into<String>) -> Self {
        let strategy = strategy.into();
        let identifier = identifier.into();
        Self {
            message: format!("Entry '{}/{}' deleted successfully", strategy, identifier),
            strategy,
            identifier,
        }
    }
}

/// Response body for `POST /invalidate`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Cache entries removed
    pub deleted: usize,
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Cache hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub rate_limiter: RateLimitStats,
    pub etag: EtagStats,
    pub compression: CompressionStats,
    pub warmer: WarmerStats,
    pub store: MemoryStoreStats,
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Worst status across components
    pub status: HealthStatus,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let status = components
            .values()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, worst);
        Self {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            components,
        }
    }
}

fn worst(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    use HealthStatus::*;
    match (a, b) {
        (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
        (Degraded, _) | (_, Degraded) => Degraded,
        _ => Healthy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_response_serialize() {
        let resp = DeleteResponse::new("user-score", "user-1");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("user-score/user-1"));
        assert!(json.contains("deleted"));
    }

    #[test]
    fn test_health_takes_worst_status() {
        let mut components = BTreeMap::new();
        components.insert("cache".to_string(), ComponentHealth::healthy("ok"));
        assert_eq!(
            HealthResponse::from_components(components.clone()).status,
            HealthStatus::Healthy
        );

        components.insert("rate_limiter".to_string(), ComponentHealth::degraded("failing open"));
        assert_eq!(
            HealthResponse::from_components(components.clone()).status,
            HealthStatus::Degraded
        );

        components.insert("compression".to_string(), ComponentHealth::unhealthy("broken"));
        let resp = HealthResponse::from_components(components);
        assert_eq!(resp.status, HealthStatus::Unhealthy);

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"unhealthy\""));
        assert!(json.contains("timestamp"));
    }
}
