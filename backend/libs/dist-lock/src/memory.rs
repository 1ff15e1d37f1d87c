//! In-memory lease backend for tests and local development.

use crate::LockBackend;
use async_trait::async_trait;
use error_types::LockResult;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemoryLockBackend {
    leases: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> LockResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(key) {
            Some((_, expiry)) if *expiry > Instant::now() => Ok(false),
            _ => {
                leases.insert(key.to_string(), (holder.to_string(), Instant::now() + ttl));
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> LockResult<bool> {
        let mut leases = self.leases.lock().await;
        match leases.get(key) {
            Some((owner, expiry)) if owner == holder && *expiry > Instant::now() => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
