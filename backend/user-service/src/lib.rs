//! User aggregate: model, Postgres store, cached composition and the
//! application service consuming them. Transport (gRPC/HTTP) lives with
//! the gateway, outside this crate.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

use clip_cache::{ttl, CacheBackend, CachedStore};
use models::User;
use repository::PgUserStore;
use std::sync::Arc;

/// Compose the Postgres store with the cache-aside layer, one hour TTL.
pub fn cached_user_store(
    store: PgUserStore,
    backend: Arc<dyn CacheBackend>,
) -> CachedStore<PgUserStore, User> {
    CachedStore::new(store, backend, ttl::USER)
}
