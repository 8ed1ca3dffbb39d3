//! The three stages of the default chain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{PipelineResponse, RequestContext, Stage};
use crate::compression::{is_compressible, CompressionManager};
use crate::error::CacheError;
use crate::etag::ConditionalCacheManager;
use crate::ratelimit::RateLimiter;

// == Rate Limit Stage ==
/// Rejects over-limit callers with 429 and stamps `X-RateLimit-*` headers.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate-limit"
    }

    async fn before(&self, ctx: &mut RequestContext) -> Option<PipelineResponse> {
        let (allowed, info) = self
            .limiter
            .is_allowed(&ctx.subject, &ctx.resource, &ctx.tier)
            .await;
        ctx.rate_limit = Some(info);

        if allowed {
            return None;
        }

        let retry_after = info.retry_after.unwrap_or_default();
        let message = CacheError::RateLimited { retry_after }.to_string();
        Some(PipelineResponse::json(
            StatusCode::TOO_MANY_REQUESTS,
            &json!({ "error": message, "retry_after": retry_after }),
        ))
    }

    async fn after(&self, ctx: &RequestContext, response: &mut PipelineResponse) {
        if let Some(info) = ctx.rate_limit {
            response.headers.extend(info.headers());
        }
    }
}

// == Conditional Stage ==
/// Answers 304 when the client's tag matches the recorded one, and records
/// fresh tags for successful reads.
///
/// A `Cache-Control: max-age` on the handler's response caps how long the
/// tag is kept, so a tag never outlives the content it describes.
pub struct ConditionalStage {
    etags: Arc<ConditionalCacheManager>,
    weak: bool,
}

impl ConditionalStage {
    pub fn new(etags: Arc<ConditionalCacheManager>) -> Self {
        Self { etags, weak: false }
    }

    /// Emit weak (`W/`) tags.
    pub fn weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }

    fn tag_for(&self, response: &PipelineResponse) -> String {
        if response.content_type().contains("json") {
            if let Ok(value) = serde_json::from_slice::<Value>(&response.body) {
                return self.etags.generate(&value, self.weak);
            }
        }
        self.etags.generate_bytes(&response.body, self.weak)
    }
}

#[async_trait]
impl Stage for ConditionalStage {
    fn name(&self) -> &'static str {
        "conditional"
    }

    async fn before(&self, ctx: &mut RequestContext) -> Option<PipelineResponse> {
        if !ctx.is_read() {
            return None;
        }
        let client_tag = ctx.if_none_match.as_deref()?;
        let stored = self.etags.get(&ctx.etag_key()).await;

        if !self.etags.validate(Some(client_tag), stored.as_deref()) {
            return None;
        }

        let mut response = PipelineResponse::new(StatusCode::NOT_MODIFIED, Bytes::new());
        if let Some(value) = stored.and_then(|tag| HeaderValue::from_str(&tag).ok()) {
            response.headers.insert(header::ETAG, value);
        }
        Some(response)
    }

    async fn after(&self, ctx: &RequestContext, response: &mut PipelineResponse) {
        let key = ctx.etag_key();

        if !ctx.is_read() {
            if response.status.is_success() {
                self.etags.invalidate(&key).await;
            }
            return;
        }
        if response.status != StatusCode::OK || response.body.is_empty() {
            return;
        }

        let tag = self.tag_for(response);
        if let Ok(value) = HeaderValue::from_str(&tag) {
            response.headers.insert(header::ETAG, value);
        }
        match max_age(&response.headers) {
            Some(0) => debug!("Not recording tag for {}: content already stale", key),
            Some(secs) => {
                let ttl = Duration::from_secs(secs).min(self.etags.default_ttl());
                self.etags.set(&key, &tag, Some(ttl)).await;
            }
            None => {
                self.etags.set(&key, &tag, None).await;
            }
        }

        // Client already holds exactly this representation
        if self.etags.validate(ctx.if_none_match.as_deref(), Some(&tag)) {
            debug!("Fresh response for {} matches client tag", key);
            response.status = StatusCode::NOT_MODIFIED;
            response.body = Bytes::new();
            response.headers.remove(header::CONTENT_LENGTH);
        }
    }
}

/// `max-age` seconds from a response's `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|directive| directive.trim().strip_prefix("max-age=")?.parse().ok())
}

// == Compression Stage ==
/// Encodes compressible bodies with the best encoding the client accepts.
pub struct CompressionStage {
    compression: Arc<CompressionManager>,
}

impl CompressionStage {
    pub fn new(compression: Arc<CompressionManager>) -> Self {
        Self { compression }
    }
}

#[async_trait]
impl Stage for CompressionStage {
    fn name(&self) -> &'static str {
        "compression"
    }

    async fn after(&self, ctx: &RequestContext, response: &mut PipelineResponse) {
        if response.body.is_empty()
            || response.status == StatusCode::NOT_MODIFIED
            || response.headers.contains_key(header::CONTENT_ENCODING)
        {
            return;
        }

        let content_type = response.content_type().to_string();
        if !is_compressible(&content_type) {
            return;
        }
        response.headers.append(
            header::VARY,
            HeaderValue::from_static("accept-encoding"),
        );

        let Some(encoding) = self.compression.negotiate(ctx.accept_encoding.as_deref()) else {
            return;
        };
        if !self.compression.decide(&response.body, &content_type).should_compress {
            return;
        }

        let packed = self.compression.compress_with(&response.body, encoding);
        if packed.is_compressed() {
            response.headers.insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(packed.encoding.as_str()),
            );
            response.headers.remove(header::CONTENT_LENGTH);
            response.body = Bytes::from(packed.bytes);
        }
    }
}
