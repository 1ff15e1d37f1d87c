//! Redis lease backend
//!
//! Acquisition is `SET key holder NX PX ttl`; release is a Lua
//! compare-and-delete so a session can never delete a lease it no longer
//! owns (the token fences against delayed releases after expiry).

use crate::LockBackend;
use async_trait::async_trait;
use error_types::{LockError, LockResult};
use redis_utils::SharedConnectionManager;
use std::time::Duration;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisLockBackend {
    redis: SharedConnectionManager,
}

impl RedisLockBackend {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl LockBackend for RedisLockBackend {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> LockResult<bool> {
        let ttl_ms = ttl.as_millis().max(1) as usize;
        let mut conn = self.redis.lock().await;

        let was_set: bool = redis::AsyncCommands::set_options(
            &mut *conn,
            key,
            holder,
            redis::SetOptions::default()
                .conditional_set(redis::ExistenceCheck::NX)
                .with_expiration(redis::SetExpiry::PX(ttl_ms)),
        )
        .await
        .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(was_set)
    }

    async fn release(&self, key: &str, holder: &str) -> LockResult<bool> {
        let mut conn = self.redis.lock().await;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(holder)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(deleted == 1)
    }
}
