//! Change notifications for entries written through CacheStore.

use async_trait::async_trait;

/// Told about every entry CacheStore writes or removes, so state derived
/// from a cached value can be dropped with it.
#[async_trait]
pub trait CacheListener: Send + Sync {
    /// `identifier`'s entries under `strategy` were written or removed.
    async fn entry_changed(&self, strategy: &str, identifier: &str);

    /// Entries matching the key glob `pattern` were removed.
    async fn entries_invalidated(&self, pattern: &str);
}
