//! fincache - caching and API-performance layer
//!
//! Strategy-driven caching, sliding-window rate limiting, ETag validation,
//! response compression and background cache warming, composed as an
//! explicit request pipeline.

pub mod api;
pub mod cache;
pub mod compression;
pub mod config;
pub mod error;
pub mod etag;
pub mod health;
pub mod models;
pub mod pipeline;
pub mod ratelimit;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheListener, CacheStore, CacheStrategy, SerializationFormat, StrategyTable};
pub use compression::{CompressionManager, Encoding};
pub use config::Config;
pub use error::{CacheError, Result};
pub use etag::ConditionalCacheManager;
pub use pipeline::{Pipeline, PipelineResponse, RequestContext, Stage};
pub use ratelimit::{FailurePolicy, RateLimitConfig, RateLimitInfo, RateLimiter};
pub use store::{KvStore, MemoryStore, WindowStore};
pub use tasks::{spawn_cleanup_task, CacheWarmer, CronSchedule, WarmScheduler, WarmSource};
