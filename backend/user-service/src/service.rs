//! User application service
//!
//! Thin orchestration over the entity store; generic over the store so
//! every path runs against the in-memory store in tests and the cached
//! Postgres composition in production.

use crate::error::{Result, UserError};
use crate::models::{User, UserKey};
use entity_store::EntityStore;
use tracing::info;
use uuid::Uuid;

pub struct UserService<S> {
    store: S,
}

impl<S> UserService<S>
where
    S: EntityStore<User>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a new account. The password arrives already hashed.
    pub async fn register(&self, username: &str, password_hash: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserError::InvalidUsername("must not be empty".into()));
        }
        if username.len() > 32 {
            return Err(UserError::InvalidUsername("longer than 32 characters".into()));
        }

        let user = self.store.create(User::new(username, password_hash)).await?;
        info!(user_id = %user.id, username = %user.username, "registered user");
        Ok(user)
    }

    pub async fn profile(&self, id: Uuid) -> Result<User> {
        Ok(self.store.get(&UserKey::Id(id)).await?)
    }

    pub async fn profile_by_username(&self, username: &str) -> Result<User> {
        Ok(self
            .store
            .get(&UserKey::Username(username.to_string()))
            .await?)
    }

    pub async fn rename(&self, id: Uuid, new_username: &str) -> Result<User> {
        let updated = self
            .store
            .update_with_lock(&UserKey::Id(id), User::rename(new_username.to_string()))
            .await?;
        info!(user_id = %updated.id, username = %updated.username, "renamed user");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_store::MemoryStore;

    fn memory_store() -> MemoryStore<User> {
        MemoryStore::with_hooks(|user, _| user, |a, b| a.username == b.username)
    }

    fn service() -> UserService<MemoryStore<User>> {
        UserService::new(memory_store())
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let service = service();
        let alice = service.register("alice", "hash").await.unwrap();

        assert_eq!(service.profile(alice.id).await.unwrap(), alice);
        assert_eq!(service.profile_by_username("alice").await.unwrap(), alice);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let service = service();
        service.register("alice", "hash").await.unwrap();
        let err = service.register("alice", "other").await.unwrap_err();
        assert!(matches!(err, UserError::UsernameTaken));
    }

    #[tokio::test]
    async fn register_validates_username() {
        let service = service();
        let err = service.register("  ", "hash").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidUsername(_)));

        let long = "a".repeat(33);
        let err = service.register(&long, "hash").await.unwrap_err();
        assert!(matches!(err, UserError::InvalidUsername(_)));
    }

    #[tokio::test]
    async fn rename_is_visible_under_both_keys() {
        let service = service();
        let alice = service.register("alice", "hash").await.unwrap();

        service.rename(alice.id, "alicia").await.unwrap();
        let renamed = service.profile(alice.id).await.unwrap();
        assert_eq!(renamed.username, "alicia");
        assert_eq!(
            service.profile_by_username("alicia").await.unwrap().id,
            alice.id
        );
    }

    #[tokio::test]
    async fn concurrent_follower_bumps_are_serialized() {
        let store = memory_store();
        let service = UserService::new(store.clone());
        let alice = service.register("alice", "hash").await.unwrap();
        let key = UserKey::Id(alice.id);

        let bump = || {
            let store = store.clone();
            let key = key.clone();
            async move {
                store
                    .update_with_lock(&key, User::adjust_follower_count(1))
                    .await
            }
        };
        let (a, b) = tokio::join!(bump(), bump());
        a.unwrap();
        b.unwrap();

        assert_eq!(service.profile(alice.id).await.unwrap().follower_count, 2);
    }
}
