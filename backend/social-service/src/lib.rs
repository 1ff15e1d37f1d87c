//! Social aggregates: follow relations, favorites and comments, plus the
//! orchestration that keeps their counters consistent across stores.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

use clip_cache::{ttl, CacheBackend, CachedStore};
use models::{Favorite, Relation};
use repository::{PgFavoriteStore, PgRelationStore};
use std::sync::Arc;

/// Compose the Postgres relation store with the cache-aside layer.
pub fn cached_relation_store(
    store: PgRelationStore,
    backend: Arc<dyn CacheBackend>,
) -> CachedStore<PgRelationStore, Relation> {
    CachedStore::new(store, backend, ttl::RELATION)
}

/// Compose the Postgres favorite store with the cache-aside layer.
pub fn cached_favorite_store(
    store: PgFavoriteStore,
    backend: Arc<dyn CacheBackend>,
) -> CachedStore<PgFavoriteStore, Favorite> {
    CachedStore::new(store, backend, ttl::FAVORITE)
}
