//! Cache-aside decorator semantics against in-memory fakes.

use async_trait::async_trait;
use clip_cache::{CacheBackend, CacheError, CacheResult, CachedStore, Cacheable, MemoryBackend};
use entity_store::{Entity, EntityStore, MemoryStore};
use error_types::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Profile {
    id: u64,
    username: String,
    follower_count: i64,
}

#[derive(Clone, Debug)]
enum ProfileKey {
    Id(u64),
    Username(String),
}

impl Entity for Profile {
    type Key = ProfileKey;

    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            ProfileKey::Id(id) => self.id == *id,
            ProfileKey::Username(name) => self.username == *name,
        }
    }
}

impl Cacheable for Profile {
    const ENTITY: &'static str = "profile";

    fn lookup_key(key: &Self::Key) -> String {
        match key {
            ProfileKey::Id(id) => format!("v1:profile:id:{}", id),
            ProfileKey::Username(name) => format!("v1:profile:username:{}", name),
        }
    }

    fn invalidation_keys(&self) -> Vec<String> {
        vec![
            format!("v1:profile:id:{}", self.id),
            format!("v1:profile:username:{}", self.username),
        ]
    }
}

/// Backend that fails every call, for fail-open assertions.
struct DownBackend;

#[async_trait]
impl CacheBackend for DownBackend {
    async fn get_raw(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::Unavailable("backend down".into()))
    }

    async fn set(&self, _key: &str, _payload: &str, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError::Unavailable("backend down".into()))
    }

    async fn del(&self, _keys: &[String]) -> CacheResult<()> {
        Err(CacheError::Unavailable("backend down".into()))
    }
}

fn inner_store() -> MemoryStore<Profile> {
    MemoryStore::with_hooks(
        |mut profile, seq| {
            profile.id = seq;
            profile
        },
        |a, b| a.username == b.username,
    )
}

fn profile(username: &str) -> Profile {
    Profile {
        id: 0,
        username: username.to_string(),
        follower_count: 0,
    }
}

fn cached(
    inner: MemoryStore<Profile>,
    backend: Arc<dyn CacheBackend>,
) -> CachedStore<MemoryStore<Profile>, Profile> {
    CachedStore::new(inner, backend, Duration::from_secs(3600))
}

fn increment() -> entity_store::MutateFn<Profile> {
    Box::new(|mut p| {
        p.follower_count += 1;
        Ok(p)
    })
}

#[tokio::test]
async fn miss_populates_cache_and_subsequent_reads_hit() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner.clone(), Arc::new(backend.clone()));

    let alice = store.create(profile("alice")).await.unwrap();
    let key = ProfileKey::Id(alice.id);

    assert_eq!(store.get(&key).await.unwrap(), alice);
    assert!(backend.contains(&Profile::lookup_key(&key)).await);

    // Write behind the decorator's back: a hit must now serve the cached
    // projection, proving the second read does not reach the store.
    inner
        .update_with_lock(&key, increment())
        .await
        .unwrap();
    let cached_read = store.get(&key).await.unwrap();
    assert_eq!(cached_read.follower_count, 0);
}

#[tokio::test]
async fn update_invalidates_every_derived_key() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner, Arc::new(backend.clone()));

    let alice = store.create(profile("alice")).await.unwrap();
    let by_id = ProfileKey::Id(alice.id);
    let by_name = ProfileKey::Username("alice".into());

    store.get(&by_id).await.unwrap();
    store.get(&by_name).await.unwrap();
    assert!(backend.contains(&Profile::lookup_key(&by_id)).await);
    assert!(backend.contains(&Profile::lookup_key(&by_name)).await);

    store.update_with_lock(&by_id, increment()).await.unwrap();
    assert!(!backend.contains(&Profile::lookup_key(&by_id)).await);
    assert!(!backend.contains(&Profile::lookup_key(&by_name)).await);

    let fresh = store.get(&by_name).await.unwrap();
    assert_eq!(fresh.follower_count, 1);
}

#[tokio::test]
async fn key_changing_mutation_invalidates_the_old_secondary_key() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner, Arc::new(backend.clone()));

    let alice = store.create(profile("alice")).await.unwrap();
    let by_id = ProfileKey::Id(alice.id);
    let old_name = ProfileKey::Username("alice".into());

    // Warm both projections before the rename.
    store.get(&by_id).await.unwrap();
    store.get(&old_name).await.unwrap();
    assert!(backend.contains(&Profile::lookup_key(&old_name)).await);

    let rename: entity_store::MutateFn<Profile> = Box::new(|mut p| {
        p.username = "alicia".to_string();
        Ok(p)
    });
    store.update_with_lock(&by_id, rename).await.unwrap();

    // The key derived from the pre-image username is gone with the rest.
    assert!(!backend.contains(&Profile::lookup_key(&old_name)).await);
    assert!(!backend.contains(&Profile::lookup_key(&by_id)).await);
    let err = store.get(&old_name).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    let renamed = store
        .get(&ProfileKey::Username("alicia".into()))
        .await
        .unwrap();
    assert_eq!(renamed.id, alice.id);
    assert_eq!(renamed.follower_count, 0);
}

#[tokio::test]
async fn failed_write_leaves_cache_untouched() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner, Arc::new(backend.clone()));

    let alice = store.create(profile("alice")).await.unwrap();
    let key = ProfileKey::Id(alice.id);
    store.get(&key).await.unwrap();

    let err = store.create(profile("alice")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert!(backend.contains(&Profile::lookup_key(&key)).await);

    let err = store
        .update_with_lock(&key, Box::new(|_| Err(StoreError::Validation("no".into()))))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(backend.contains(&Profile::lookup_key(&key)).await);
}

#[tokio::test]
async fn unavailable_backend_degrades_to_wrapped_store() {
    let inner = inner_store();
    let store = cached(inner, Arc::new(DownBackend));

    let alice = store.create(profile("alice")).await.unwrap();
    let key = ProfileKey::Id(alice.id);

    assert_eq!(store.get(&key).await.unwrap(), alice);
    let updated = store.update_with_lock(&key, increment()).await.unwrap();
    assert_eq!(updated.follower_count, 1);

    let err = store.get(&ProfileKey::Id(999)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn corrupt_entry_is_a_miss_not_an_error() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner, Arc::new(backend.clone()));

    let alice = store.create(profile("alice")).await.unwrap();
    let key = ProfileKey::Id(alice.id);
    let cache_key = Profile::lookup_key(&key);

    backend
        .set(&cache_key, "{not valid json", Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(store.get(&key).await.unwrap(), alice);
    // The corrupt payload was replaced by a valid projection.
    let raw = backend.get_raw(&cache_key).await.unwrap().unwrap();
    assert_eq!(serde_json::from_str::<Profile>(&raw).unwrap(), alice);
}

#[tokio::test]
async fn missing_entity_is_not_found_and_never_negatively_cached() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = cached(inner, Arc::new(backend.clone()));

    for _ in 0..2 {
        let err = store
            .get(&ProfileKey::Username("missing-id".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
    assert!(backend.is_empty().await);
}

#[tokio::test]
async fn concurrent_increments_leave_no_stale_projection() {
    let inner = inner_store();
    let backend = MemoryBackend::new();
    let store = Arc::new(cached(inner, Arc::new(backend.clone())));

    let alice = store.create(profile("alice")).await.unwrap();
    let key = ProfileKey::Id(alice.id);
    // Warm the cache before the writers race.
    store.get(&key).await.unwrap();

    let bump = |store: Arc<CachedStore<MemoryStore<Profile>, Profile>>, key: ProfileKey| async move {
        store.update_with_lock(&key, increment()).await
    };
    let (a, b) = tokio::join!(
        bump(Arc::clone(&store), key.clone()),
        bump(Arc::clone(&store), key.clone())
    );
    a.unwrap();
    b.unwrap();

    // After both writers return, the projection is absent or final, never
    // an intermediate value.
    let cache_key = Profile::lookup_key(&key);
    if let Some(raw) = backend.get_raw(&cache_key).await.unwrap() {
        let projected: Profile = serde_json::from_str(&raw).unwrap();
        assert_eq!(projected.follower_count, 2);
    }
    assert_eq!(store.get(&key).await.unwrap().follower_count, 2);
}
