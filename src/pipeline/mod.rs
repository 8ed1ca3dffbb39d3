//! Request Pipeline Module
//!
//! An explicit, ordered chain of request-processing stages wrapped around a
//! handler. Each stage gets a `before` hook, which may answer the request
//! itself, and an `after` hook, which may rewrite the response.
//!
//! `after` hooks run in chain order for every stage whose `before` ran, so
//! with the default chain (rate-limit, conditional, compression) the ETag is
//! computed over the body before it is compressed.

mod stages;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::debug;

use crate::ratelimit::RateLimitInfo;

pub use stages::{CompressionStage, ConditionalStage, RateLimitStage};

// == Request Context ==
/// What the stages know about the request being served.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Caller identity used for rate limiting
    pub subject: String,
    /// Rate-limited resource, usually the route template
    pub resource: String,
    /// Concrete request path
    pub path: String,
    pub tier: String,
    pub query: Vec<(String, String)>,
    pub if_none_match: Option<String>,
    pub accept_encoding: Option<String>,
    /// Set by the rate-limit stage
    pub rate_limit: Option<RateLimitInfo>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            subject: "anonymous".to_string(),
            resource: path.clone(),
            path,
            tier: "free".to_string(),
            query: Vec::new(),
            if_none_match: None,
            accept_encoding: None,
            rate_limit: None,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn if_none_match(mut self, value: impl Into<String>) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    pub fn accept_encoding(mut self, value: impl Into<String>) -> Self {
        self.accept_encoding = Some(value.into());
        self
    }

    /// GET and HEAD responses are eligible for conditional handling.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Key under which the response's ETag is recorded: the path plus the
    /// sorted query, so parameter order never splits a record.
    pub fn etag_key(&self) -> String {
        let mut params: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        params.sort_unstable();
        format!("{}?{}", self.path, params.join("&"))
    }
}

// == Pipeline Response ==
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PipelineResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A response carrying a JSON body.
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

// == Stage ==
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns a response to answer the request without running the handler.
    async fn before(&self, _ctx: &mut RequestContext) -> Option<PipelineResponse> {
        None
    }

    async fn after(&self, _ctx: &RequestContext, _response: &mut PipelineResponse) {}
}

// == Pipeline ==
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage; stages run in the order they were added.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    // == Run ==
    /// Runs `handler` inside the chain.
    pub async fn run<F, Fut>(&self, mut ctx: RequestContext, handler: F) -> PipelineResponse
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = PipelineResponse>,
    {
        let mut entered = 0;
        let mut short_circuit = None;

        for stage in &self.stages {
            entered += 1;
            if let Some(response) = stage.before(&mut ctx).await {
                debug!(
                    "Stage {} answered {} {} with {}",
                    stage.name(),
                    ctx.method,
                    ctx.path,
                    response.status
                );
                short_circuit = Some(response);
                break;
            }
        }

        let mut response = match short_circuit {
            Some(response) => response,
            None => handler(ctx.clone()).await,
        };

        for stage in &self.stages[..entered] {
            stage.after(&ctx, &mut response).await;
        }
        response
    }
}
