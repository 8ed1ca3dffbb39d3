//! Rate Limit Module
//!
//! Sliding-window admission control per (subject, resource) pair.

mod limiter;

use std::collections::HashMap;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

pub use limiter::RateLimiter;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

// == Failure Policy ==
/// What the limiter does when the window store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the request and report `limit = 0`
    #[default]
    FailOpen,
    /// Deny the request as if the window were full
    FailClosed,
}

// == Rate Limit Config ==
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    /// Limit for resources missing from `endpoint_limits`
    pub default_limit: u32,
    pub tier_limits: HashMap<String, u32>,
    pub endpoint_limits: HashMap<String, u32>,
    pub failure_policy: FailurePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            default_limit: 100,
            tier_limits: HashMap::new(),
            endpoint_limits: HashMap::new(),
            failure_policy: FailurePolicy::FailOpen,
        }
    }
}

impl RateLimitConfig {
    /// `min(resource limit, tier limit)`. Unknown resources use the default
    /// limit; an unknown tier adds no cap of its own.
    pub fn limit_for(&self, resource: &str, tier: &str) -> u32 {
        let resource_limit = self
            .endpoint_limits
            .get(resource)
            .copied()
            .unwrap_or(self.default_limit);

        match self.tier_limits.get(tier) {
            Some(&tier_limit) => resource_limit.min(tier_limit),
            None => resource_limit,
        }
    }
}

// == Rate Limit Info ==
/// Admission details, shaped for direct exposure as response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// Effective limit; 0 when the decision was made without the store
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the oldest counted request leaves the window
    pub reset_at: u64,
    /// Seconds to wait before retrying; set only on denial
    pub retry_after: Option<u64>,
}

impl RateLimitInfo {
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(HEADER_LIMIT),
            HeaderValue::from(self.limit),
        );
        headers.insert(
            HeaderName::from_static(HEADER_REMAINING),
            HeaderValue::from(self.remaining),
        );
        headers.insert(
            HeaderName::from_static(HEADER_RESET),
            HeaderValue::from(self.reset_at),
        );
        if let Some(retry_after) = self.retry_after {
            headers.insert(
                axum::http::header::RETRY_AFTER,
                HeaderValue::from(retry_after),
            );
        }
        headers
    }
}

// == Rate Limit Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateLimitStats {
    pub checks: u64,
    pub allowed: u64,
    pub denied: u64,
    /// Window store failures and timeouts
    pub errors: u64,
    /// Requests admitted without the store under `FailOpen`
    pub failed_open: u64,
    /// Requests denied without the store under `FailClosed`
    pub failed_closed: u64,
}
