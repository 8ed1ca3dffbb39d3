//! Pipeline middleware for Axum
//!
//! Runs the rate-limit, conditional and compression stages around the
//! wrapped route's handler.

use axum::{
    body::{to_bytes, Body},
    extract::{MatchedPath, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::handlers::AppState;
use crate::pipeline::{PipelineResponse, RequestContext};

/// Header carrying the caller identity used for rate limiting.
pub const SUBJECT_HEADER: &str = "x-user-id";
/// Header carrying the caller's subscription tier.
pub const TIER_HEADER: &str = "x-user-tier";

/// Largest handler body buffered for ETag and compression processing.
const MAX_BUFFERED_BODY: usize = 8 * 1024 * 1024;

pub async fn pipeline_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = request_context(&request);

    let response = state
        .pipeline
        .run(ctx, |_| async move { buffer(next.run(request).await).await })
        .await;

    into_response(response)
}

/// Builds the stage context from the request line and headers.
pub fn request_context(request: &Request) -> RequestContext {
    let headers = request.headers();
    let path = request.uri().path().to_string();
    let resource = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let query = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(q)| q)
        .unwrap_or_default();

    let mut ctx = RequestContext::new(request.method().clone(), path)
        .resource(resource)
        .subject(header_str(headers, SUBJECT_HEADER).unwrap_or("anonymous"))
        .tier(header_str(headers, TIER_HEADER).unwrap_or("free"))
        .query(query);

    if let Some(value) = header_str(headers, header::IF_NONE_MATCH.as_str()) {
        ctx = ctx.if_none_match(value);
    }
    if let Some(value) = header_str(headers, header::ACCEPT_ENCODING.as_str()) {
        ctx = ctx.accept_encoding(value);
    }
    ctx
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn buffer(response: Response) -> PipelineResponse {
    let (parts, body) = response.into_parts();
    match to_bytes(body, MAX_BUFFERED_BODY).await {
        Ok(bytes) => PipelineResponse {
            status: parts.status,
            headers: parts.headers,
            body: bytes,
        },
        Err(e) => {
            warn!("Could not buffer response body: {}", e);
            PipelineResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &serde_json::json!({ "error": "response body unavailable" }),
            )
        }
    }
}

fn into_response(response: PipelineResponse) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out
}
