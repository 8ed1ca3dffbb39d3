//! Sliding-window rate limiter over a shared [`WindowStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{FailurePolicy, RateLimitConfig, RateLimitInfo, RateLimitStats};
use crate::health::ComponentHealth;
use crate::store::{current_timestamp_ms, with_timeout, WindowStore};

const WINDOW_NAMESPACE: &str = "ratelimit:";

#[derive(Debug, Default)]
struct LimiterCounters {
    checks: AtomicU64,
    allowed: AtomicU64,
    denied: AtomicU64,
    errors: AtomicU64,
    failed_open: AtomicU64,
    failed_closed: AtomicU64,
}

// == Rate Limiter ==
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    config: RateLimitConfig,
    timeout: Duration,
    counters: LimiterCounters,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn WindowStore>, config: RateLimitConfig, timeout: Duration) -> Self {
        Self {
            store,
            config,
            timeout,
            counters: LimiterCounters::default(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    // == Is Allowed ==
    /// Decides whether `subject` may hit `resource` now.
    pub async fn is_allowed(
        &self,
        subject: &str,
        resource: &str,
        tier: &str,
    ) -> (bool, RateLimitInfo) {
        self.is_allowed_at(subject, resource, tier, current_timestamp_ms())
            .await
    }

    /// [`is_allowed`](Self::is_allowed) with an explicit clock reading.
    pub async fn is_allowed_at(
        &self,
        subject: &str,
        resource: &str,
        tier: &str,
        now_ms: u64,
    ) -> (bool, RateLimitInfo) {
        self.counters.checks.fetch_add(1, Ordering::Relaxed);

        let limit = self.config.limit_for(resource, tier);
        let window_ms = self.config.window.as_millis() as u64;

        if limit == 0 {
            self.counters.denied.fetch_add(1, Ordering::Relaxed);
            return (false, self.denied_info(0, now_ms, None));
        }

        let key = window_key(subject, resource);
        let decision = with_timeout(
            "admit",
            self.timeout,
            self.store.admit(&key, now_ms, self.config.window, limit),
        )
        .await;

        let decision = match decision {
            Ok(decision) => decision,
            Err(e) => return self.on_store_failure(&key, limit, now_ms, e),
        };

        let reset_ms = decision
            .oldest_ms
            .unwrap_or(now_ms)
            .saturating_add(window_ms);

        if decision.admitted {
            self.counters.allowed.fetch_add(1, Ordering::Relaxed);
            let info = RateLimitInfo {
                limit,
                remaining: limit.saturating_sub(decision.count + 1),
                reset_at: ceil_secs(reset_ms),
                retry_after: None,
            };
            (true, info)
        } else {
            debug!(
                "Rate limit hit for {}: {}/{} in window",
                key, decision.count, limit
            );
            self.counters.denied.fetch_add(1, Ordering::Relaxed);
            (false, self.denied_info(limit, now_ms, Some(reset_ms)))
        }
    }

    // == Reset ==
    /// Forgets the recorded window for `(subject, resource)`.
    pub async fn reset(&self, subject: &str, resource: &str) -> bool {
        let key = window_key(subject, resource);
        match with_timeout("clear", self.timeout, self.store.clear(&key)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to reset window {}: {}", key, e);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn metrics(&self) -> RateLimitStats {
        RateLimitStats {
            checks: self.counters.checks.load(Ordering::Relaxed),
            allowed: self.counters.allowed.load(Ordering::Relaxed),
            denied: self.counters.denied.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            failed_open: self.counters.failed_open.load(Ordering::Relaxed),
            failed_closed: self.counters.failed_closed.load(Ordering::Relaxed),
        }
    }

    /// Degraded under `FailOpen` (traffic flows), unhealthy under
    /// `FailClosed` (traffic is refused) when the store is unreachable.
    pub async fn health_check(&self) -> ComponentHealth {
        match with_timeout("window_ping", self.timeout, self.store.ping()).await {
            Ok(()) => ComponentHealth::healthy(format!(
                "{}s window, default limit {}",
                self.config.window.as_secs(),
                self.config.default_limit
            )),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::FailOpen => {
                    ComponentHealth::degraded(format!("window store down, failing open: {}", e))
                }
                FailurePolicy::FailClosed => {
                    ComponentHealth::unhealthy(format!("window store down, failing closed: {}", e))
                }
            },
        }
    }

    fn on_store_failure(
        &self,
        key: &str,
        limit: u32,
        now_ms: u64,
        err: crate::error::CacheError,
    ) -> (bool, RateLimitInfo) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);

        match self.config.failure_policy {
            FailurePolicy::FailOpen => {
                warn!("Window store failed for {}, admitting (fail-open): {}", key, err);
                self.counters.failed_open.fetch_add(1, Ordering::Relaxed);
                self.counters.allowed.fetch_add(1, Ordering::Relaxed);
                let info = RateLimitInfo {
                    limit: 0,
                    remaining: 0,
                    reset_at: ceil_secs(now_ms),
                    retry_after: None,
                };
                (true, info)
            }
            FailurePolicy::FailClosed => {
                warn!("Window store failed for {}, denying (fail-closed): {}", key, err);
                self.counters.failed_closed.fetch_add(1, Ordering::Relaxed);
                self.counters.denied.fetch_add(1, Ordering::Relaxed);
                (false, self.denied_info(limit, now_ms, None))
            }
        }
    }

    fn denied_info(&self, limit: u32, now_ms: u64, reset_ms: Option<u64>) -> RateLimitInfo {
        let window_ms = self.config.window.as_millis() as u64;
        RateLimitInfo {
            limit,
            remaining: 0,
            reset_at: ceil_secs(reset_ms.unwrap_or(now_ms.saturating_add(window_ms))),
            retry_after: Some(self.config.window.as_secs()),
        }
    }
}

fn window_key(subject: &str, resource: &str) -> String {
    format!("{WINDOW_NAMESPACE}{subject}:{resource}")
}

fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
