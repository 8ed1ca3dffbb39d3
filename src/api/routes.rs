//! API Routes
//!
//! Configures the Axum router with every endpoint.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, invalidate_handler, set_handler, stats_handler,
    AppState,
};
use super::middleware::pipeline_middleware;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT|GET|DELETE /cache/:strategy/:identifier` - cache entry operations,
///   query string = key parameters, served through the request pipeline
/// - `POST /invalidate` - pattern or trigger invalidation
/// - `GET /stats` - metrics of every component
/// - `GET /health` - health of every component
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cached = Router::new()
        .route(
            "/cache/:strategy/:identifier",
            get(get_handler).put(set_handler).delete(delete_handler),
        )
        .route_layer(from_fn_with_state(state.clone(), pipeline_middleware));

    Router::new()
        .merge(cached)
        .route("/invalidate", post(invalidate_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
