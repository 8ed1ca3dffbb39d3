//! API Module
//!
//! HTTP surface over the caching layer.
//!
//! # Endpoints
//! - `PUT /cache/:strategy/:identifier` - Store a value
//! - `GET /cache/:strategy/:identifier` - Read a value
//! - `DELETE /cache/:strategy/:identifier` - Delete a value
//! - `POST /invalidate` - Invalidate by pattern or trigger
//! - `GET /stats` - Component metrics
//! - `GET /health` - Component health

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::{pipeline_middleware, SUBJECT_HEADER, TIER_HEADER};
pub use routes::create_router;
