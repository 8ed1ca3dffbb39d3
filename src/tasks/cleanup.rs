//! Expired Entry Cleanup Task
//!
//! Background sweep that drops expired entries and idle rate-limit windows
//! from the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that calls [`MemoryStore::cleanup_expired`]
/// every `cleanup_interval_secs` seconds.
///
/// Abort the returned handle to stop the task during shutdown.
pub fn spawn_cleanup_task(store: Arc<MemoryStore>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;
            if removed > 0 {
                info!("Cleanup: removed {} expired entries", removed);
            } else {
                debug!("Cleanup: no expired entries found");
            }
        }
    })
}
