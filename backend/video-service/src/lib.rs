//! Video aggregate: model, Postgres store with feed queries, cached
//! composition and the application service consuming them.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

use clip_cache::{ttl, CacheBackend, CachedStore};
use models::Video;
use repository::PgVideoStore;
use std::sync::Arc;

/// Compose the Postgres store with the cache-aside layer, one hour TTL.
/// Feed and per-author listings bypass the cache and hit the store.
pub fn cached_video_store(
    store: PgVideoStore,
    backend: Arc<dyn CacheBackend>,
) -> CachedStore<PgVideoStore, Video> {
    CachedStore::new(store, backend, ttl::VIDEO)
}
