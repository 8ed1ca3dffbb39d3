//! Store fakes for degradation tests.

use std::time::Duration;

use async_trait::async_trait;

use super::{KvStore, WindowDecision, WindowStore};
use crate::error::{CacheError, Result};

/// A store whose every call fails as unreachable.
#[derive(Debug, Default)]
pub struct UnavailableStore;

fn down<T>() -> Result<T> {
    Err(CacheError::StoreUnavailable("connection refused".to_string()))
}

#[async_trait]
impl KvStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        down()
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        down()
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        down()
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<usize> {
        down()
    }

    async fn ping(&self) -> Result<()> {
        down()
    }
}

#[async_trait]
impl WindowStore for UnavailableStore {
    async fn admit(
        &self,
        _key: &str,
        _now_ms: u64,
        _window: Duration,
        _limit: u32,
    ) -> Result<WindowDecision> {
        down()
    }

    async fn clear(&self, _key: &str) -> Result<()> {
        down()
    }

    async fn ping(&self) -> Result<()> {
        down()
    }
}

/// A store that never answers within any reasonable deadline.
#[derive(Debug, Default)]
pub struct SlowStore;

const HANG: Duration = Duration::from_secs(30);

#[async_trait]
impl KvStore for SlowStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        tokio::time::sleep(HANG).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        tokio::time::sleep(HANG).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        tokio::time::sleep(HANG).await;
        Ok(false)
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<usize> {
        tokio::time::sleep(HANG).await;
        Ok(0)
    }

    async fn ping(&self) -> Result<()> {
        tokio::time::sleep(HANG).await;
        Ok(())
    }
}

#[async_trait]
impl WindowStore for SlowStore {
    async fn admit(
        &self,
        _key: &str,
        now_ms: u64,
        _window: Duration,
        _limit: u32,
    ) -> Result<WindowDecision> {
        tokio::time::sleep(HANG).await;
        Ok(WindowDecision {
            count: 0,
            admitted: true,
            oldest_ms: Some(now_ms),
        })
    }

    async fn clear(&self, _key: &str) -> Result<()> {
        tokio::time::sleep(HANG).await;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        tokio::time::sleep(HANG).await;
        Ok(())
    }
}
