//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycles, including the rate-limit,
//! conditional and compression stages wrapped around cache routes.

use std::io::Read;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use fincache::{create_router, AppState, Config, StrategyTable};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_app_with(Config::default())
}

fn create_app_with(config: Config) -> Router {
    create_router(AppState::new(&config, StrategyTable::builtin()))
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_to_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn put(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", "user-7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().uri(uri).header("x-user-id", "user-7")
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

// == Cache Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get() {
    let app = create_test_app();

    let response = send(
        &app,
        put(
            "/cache/daily-summary/user-7?date=2024-01-01",
            json!({"value": {"score": 42}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert_eq!(json["stored"], true);

    let response = send(
        &app,
        get("/cache/daily-summary/user-7?date=2024-01-01")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response).await;
    assert_eq!(json["value"], json!({"score": 42}));

    let response = send(
        &app,
        get("/cache/daily-summary/user-7?date=2024-01-02")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_strategy_is_bad_request() {
    let app = create_test_app();

    let response = send(
        &app,
        get("/cache/weekly-digest/user-7").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("weekly-digest"));
}

#[tokio::test]
async fn test_set_invalid_ttl() {
    let app = create_test_app();

    let response = send(
        &app,
        put("/cache/user-score/user-7", json!({"value": 1, "ttl": 0})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_invalid_json() {
    let app = create_test_app();

    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/cache/user-score/user-7")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap(),
    )
    .await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_delete_then_get() {
    let app = create_test_app();
    send(&app, put("/cache/user-score/user-7", json!({"value": 710}))).await;

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/cache/user-score/user-7")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Pipeline Behaviour ==

#[tokio::test]
async fn test_rate_limit_headers_and_rejection() {
    let mut config = Config::default();
    config.rate_limit_default = 2;
    let app = create_app_with(config);

    for remaining in ["1", "0"] {
        let response = send(
            &app,
            get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = send(
        &app,
        get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    let json = body_to_json(response).await;
    assert_eq!(json["retry_after"], 60);

    // Another subject has its own window
    let response = send(
        &app,
        Request::builder()
            .uri("/cache/user-score/user-7")
            .header("x-user-id", "user-8")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_tier_caps_limit() {
    let mut config = Config::default();
    config.rate_limit_default = 100;
    config.rate_limit_tiers = [("trial".to_string(), 1)].into();
    let app = create_app_with(config);

    let trial = || {
        get("/cache/user-score/user-7")
            .header("x-user-tier", "trial")
            .body(Body::empty())
            .unwrap()
    };

    assert_ne!(send(&app, trial()).await.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send(&app, trial()).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_etag_round_trip() {
    let app = create_test_app();
    send(
        &app,
        put("/cache/user-score/user-7", json!({"value": {"score": 710}})),
    )
    .await;

    let response = send(
        &app,
        get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();

    let response = send(
        &app,
        get("/cache/user-score/user-7")
            .header(header::IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response).await.is_empty());

    // A write drops the recorded tag, so the old one no longer matches
    send(
        &app,
        put("/cache/user-score/user-7", json!({"value": {"score": 720}})),
    )
    .await;
    let response = send(
        &app,
        get("/cache/user-score/user-7")
            .header(header::IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(response.headers()[header::ETAG], etag.as_str());
}

#[tokio::test]
async fn test_expired_entry_never_answers_not_modified() {
    let app = create_test_app();
    send(
        &app,
        put("/cache/market-data/AAPL", json!({"value": {"price": 189.5}, "ttl": 1})),
    )
    .await;

    let response = send(
        &app,
        get("/cache/market-data/AAPL").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let max_age = response.headers()[header::CACHE_CONTROL].to_str().unwrap().to_string();
    assert!(max_age == "max-age=0" || max_age == "max-age=1");
    let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let response = send(
        &app,
        get("/cache/market-data/AAPL")
            .header(header::IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_writes_outside_http_drop_tags() {
    let state = AppState::new(&Config::default(), StrategyTable::builtin());
    let app = create_router(state.clone());
    send(
        &app,
        put("/cache/user-score/user-7", json!({"value": {"score": 710}})),
    )
    .await;

    let tag_of = |response: &Response| {
        response.headers()[header::ETAG].to_str().unwrap().to_string()
    };
    let conditional = |etag: &str| {
        get("/cache/user-score/user-7")
            .header(header::IF_NONE_MATCH, etag)
            .body(Body::empty())
            .unwrap()
    };

    let response = send(&app, get("/cache/user-score/user-7").body(Body::empty()).unwrap()).await;
    let etag = tag_of(&response);
    assert_eq!(send(&app, conditional(&etag)).await.status(), StatusCode::NOT_MODIFIED);

    // Direct write, as the warmer does
    state
        .cache
        .set("user-score", "user-7", &json!({"score": 725}), &[], None)
        .await
        .unwrap();
    let response = send(&app, conditional(&etag)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = tag_of(&response);

    // Trigger invalidation without an HTTP call
    assert_eq!(
        state.cache.invalidate_by_trigger("goal_updated", "user-7").await,
        1
    );
    assert_eq!(send(&app, conditional(&etag)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_large_response_is_gzipped() {
    let app = create_test_app();
    let months: Vec<Value> = (1..=60)
        .map(|m| json!({"month": m, "projected_balance": 1520.25, "note": "on track"}))
        .collect();
    send(
        &app,
        put("/cache/daily-summary/user-7", json!({"value": months})),
    )
    .await;

    let response = send(
        &app,
        get("/cache/daily-summary/user-7")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let packed = body_bytes(response).await;
    let mut plain = String::new();
    GzDecoder::new(packed.as_slice())
        .read_to_string(&mut plain)
        .unwrap();
    let json: Value = serde_json::from_str(&plain).unwrap();
    assert_eq!(json["value"].as_array().unwrap().len(), 60);
}

#[tokio::test]
async fn test_small_response_is_not_compressed() {
    let app = create_test_app();
    send(&app, put("/cache/user-score/user-7", json!({"value": 1}))).await;

    let response = send(
        &app,
        get("/cache/user-score/user-7")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
}

// == Invalidate Endpoint Tests ==

#[tokio::test]
async fn test_invalidate_by_pattern() {
    let app = create_test_app();
    send(&app, put("/cache/user-score/user-42", json!({"value": 1}))).await;
    send(&app, put("/cache/daily-summary/user-42?date=d", json!({"value": 2}))).await;
    send(&app, put("/cache/user-score/user-7", json!({"value": 3}))).await;

    let invalidate = |pattern: &str| {
        Request::builder()
            .method("POST")
            .uri("/invalidate")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "pattern": pattern }).to_string()))
            .unwrap()
    };

    let response = send(&app, invalidate("*:user-42:*")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response).await["deleted"], 2);

    let response = send(&app, invalidate("*:user-42:*")).await;
    assert_eq!(body_to_json(response).await["deleted"], 0);

    let response = send(
        &app,
        get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalidate_rejects_empty_request() {
    let app = create_test_app();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/invalidate")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Stats and Health ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();
    send(&app, put("/cache/user-score/user-7", json!({"value": 1}))).await;
    send(
        &app,
        get("/cache/user-score/user-7").body(Body::empty()).unwrap(),
    )
    .await;
    send(
        &app,
        get("/cache/user-score/user-8").body(Body::empty()).unwrap(),
    )
    .await;

    let response = send(
        &app,
        Request::builder().uri("/stats").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["cache"]["hits"], 1);
    assert_eq!(json["cache"]["misses"], 1);
    assert_eq!(json["cache"]["sets"], 1);
    assert_eq!(json["hit_rate"], 0.5);
    assert_eq!(json["rate_limiter"]["allowed"], 3);
    assert!(json["etag"].is_object());
    assert!(json["compression"].is_object());
    assert!(json["warmer"].is_object());
    assert_eq!(json["store"]["entries"], 2);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response).await;
    assert_eq!(json["status"], "healthy");
    for component in ["cache", "rate_limiter", "etag", "compression", "warmer"] {
        assert_eq!(json["components"][component]["status"], "healthy");
    }
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app();

    let response = send(
        &app,
        Request::builder().uri("/nope").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
