//! Cache Module
//!
//! Strategy-driven caching of computed results: key composition, the
//! stored envelope, per-strategy policies and the CacheStore itself.

mod entry;
mod key;
mod listener;
mod stats;
mod store;
mod strategy;


// Re-export public types
pub use entry::CacheEntry;
pub use key::{identifier_pattern, sha256_hex, CacheKey, MAX_KEY_LENGTH};
pub use listener::CacheListener;
pub use stats::CacheStats;
pub use store::{CacheStore, CACHE_NAMESPACE, COMPRESSION_THRESHOLD};
pub use strategy::{CacheStrategy, SerializationFormat, StrategyTable};
