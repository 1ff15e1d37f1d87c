//! Generic cache-aside decorator
//!
//! One implementation parameterized by entity type, key derivation and
//! serialization, composed identically for every aggregate instead of
//! rewriting the read-through/invalidate logic five times.

use crate::{add_jitter, CacheBackend, CacheMetrics};
use async_trait::async_trait;
use entity_store::{Entity, EntityStore, MutateFn};
use error_types::StoreResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Key derivation and serialization for a cacheable aggregate.
pub trait Cacheable: Entity + Serialize + DeserializeOwned {
    /// Entity label used in cache keys and metrics.
    const ENTITY: &'static str;

    /// Cache key serving a lookup by `key` (one per key form).
    fn lookup_key(key: &Self::Key) -> String;

    /// Every cache key that may hold a projection of this entity.
    /// Invalidated as a set after any successful write.
    fn invalidation_keys(&self) -> Vec<String>;
}

/// Cache-aside decorator over an [`EntityStore`].
pub struct CachedStore<S, E> {
    inner: S,
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    metrics: CacheMetrics,
    _entity: PhantomData<fn() -> E>,
}

impl<S, E> CachedStore<S, E>
where
    S: EntityStore<E>,
    E: Cacheable,
{
    pub fn new(inner: S, backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            inner,
            backend,
            ttl,
            metrics: CacheMetrics::new(),
            _entity: PhantomData,
        }
    }

    /// The wrapped store, for operations with no cache projection
    /// (list queries and the like).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn populate(&self, cache_key: &str, entity: &E) {
        let payload = match serde_json::to_string(entity) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %cache_key, error = %err, "cache serialization failed");
                self.metrics.record_error(cache_key, "serialize");
                return;
            }
        };
        match self.backend.set(cache_key, &payload, add_jitter(self.ttl)).await {
            Ok(()) => {
                debug!(key = %cache_key, "cache populated");
                self.metrics.record_write(cache_key);
            }
            Err(err) => {
                warn!(key = %cache_key, error = %err, "cache populate failed");
                self.metrics.record_error(cache_key, "set");
            }
        }
    }

    /// Delete the given derived keys. Called strictly after the durable
    /// write committed; a failure here leaves entries to expire via TTL
    /// and is not surfaced.
    async fn invalidate(&self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        match self.backend.del(&keys).await {
            Ok(()) => {
                for key in &keys {
                    debug!(key = %key, "cache invalidated");
                    self.metrics.record_invalidation(key);
                }
            }
            Err(err) => {
                warn!(
                    entity = E::ENTITY,
                    error = %err,
                    "cache invalidation failed; entries expire via TTL"
                );
                self.metrics.record_error(&keys[0], "del");
            }
        }
    }
}

#[async_trait]
impl<S, E> EntityStore<E> for CachedStore<S, E>
where
    S: EntityStore<E>,
    E: Cacheable,
{
    async fn get(&self, key: &E::Key) -> StoreResult<E> {
        let cache_key = E::lookup_key(key);

        match self.backend.get_raw(&cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<E>(&raw) {
                Ok(entity) => {
                    debug!(key = %cache_key, "cache hit");
                    self.metrics.record_hit(&cache_key);
                    return Ok(entity);
                }
                Err(err) => {
                    // Corrupted entry: treat as a miss, drop it best-effort.
                    warn!(key = %cache_key, error = %err, "cache deserialization failed");
                    self.metrics.record_error(&cache_key, "deserialize");
                    let _ = self.backend.del(std::slice::from_ref(&cache_key)).await;
                }
            },
            Ok(None) => {
                debug!(key = %cache_key, "cache miss");
                self.metrics.record_miss(&cache_key);
            }
            Err(err) => {
                // Fail-open: behave as if the cache were absent.
                warn!(key = %cache_key, error = %err, "cache read failed, falling through");
                self.metrics.record_error(&cache_key, "get");
            }
        }

        let entity = self.inner.get(key).await?;
        // A NotFound result is never cached (no negative entries).
        self.populate(&cache_key, &entity).await;
        Ok(entity)
    }

    async fn create(&self, entity: E) -> StoreResult<E> {
        let created = self.inner.create(entity).await?;
        self.invalidate(created.invalidation_keys()).await;
        Ok(created)
    }

    async fn update_with_lock(&self, key: &E::Key, mutate: MutateFn<E>) -> StoreResult<E> {
        // Record the locked snapshot's keys before the mutation runs: a
        // mutation that changes a secondary-index field (a rename, say)
        // must also drop the key derived from the old value, or that key
        // would keep serving the pre-write projection until its TTL.
        let pre_keys = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&pre_keys);
        let recorded: MutateFn<E> = Box::new(move |snapshot: E| {
            if let Ok(mut keys) = recorder.lock() {
                *keys = snapshot.invalidation_keys();
            }
            mutate(snapshot)
        });

        let updated = self.inner.update_with_lock(key, recorded).await?;

        // Union of pre- and post-image keys, deleted as one set.
        let mut keys = updated.invalidation_keys();
        if let Ok(pre) = pre_keys.lock() {
            for key in pre.iter() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        self.invalidate(keys).await;
        Ok(updated)
    }
}
