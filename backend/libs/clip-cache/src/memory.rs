//! In-memory cache backend for tests and local development.

use crate::{CacheBackend, CacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for assertions in tests.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|(_, expiry)| *expiry > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        matches!(entries.get(key), Some((_, expiry)) if *expiry > Instant::now())
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((payload, expiry)) if *expiry > Instant::now() => Ok(Some(payload.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (payload.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(backend.get_raw("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.get_raw("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn del_removes_all_keys() {
        let backend = MemoryBackend::new();
        backend.set("a", "1", Duration::from_secs(60)).await.unwrap();
        backend.set("b", "2", Duration::from_secs(60)).await.unwrap();
        backend.del(&["a".into(), "b".into()]).await.unwrap();
        assert!(backend.is_empty().await);
    }
}
