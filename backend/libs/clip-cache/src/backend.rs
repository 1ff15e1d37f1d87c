//! Cache backend abstraction
//!
//! Any key-value store with TTL support satisfies this interface. The
//! production implementation is Redis through the shared connection
//! manager; tests use [`crate::MemoryBackend`].

use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::{AsyncCommands, Pipeline};
use redis_utils::SharedConnectionManager;
use std::time::Duration;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the raw payload stored under `key`, if any.
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `payload` under `key` with the given TTL.
    async fn set(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete every key in `keys`.
    async fn del(&self, keys: &[String]) -> CacheResult<()>;
}

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisBackend {
    redis: SharedConnectionManager,
}

impl RedisBackend {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.redis.lock().await;
        let value: Option<String> = conn.get(key).await.map_err(CacheError::Redis)?;
        Ok(value)
    }

    async fn set(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, payload, ttl.as_secs().max(1))
            .await
            .map_err(CacheError::Redis)?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.lock().await;
        let mut pipe = Pipeline::new();
        for key in keys {
            pipe.del(key);
        }
        pipe.query_async::<_, ()>(&mut *conn)
            .await
            .map_err(CacheError::Redis)?;
        Ok(())
    }
}
