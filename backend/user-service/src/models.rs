//! User aggregate model
//!
//! Counters are denormalized aggregate state owned by the store; callers
//! only ever see snapshots and mutate through `update_with_lock`.

use chrono::{DateTime, Utc};
use clip_cache::{CacheKey, Cacheable};
use entity_store::{Entity, MutateFn};
use error_types::StoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Opaque hash produced upstream; this crate never hashes.
    pub password_hash: String,
    pub following_count: i64,
    pub follower_count: i64,
    /// Favorites received across all of this user's videos.
    pub total_favorited: i64,
    /// Number of published videos.
    pub work_count: i64,
    /// Number of videos this user has favorited.
    pub favorite_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, password_hash: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            following_count: 0,
            follower_count: 0,
            total_favorited: 0,
            work_count: 0,
            favorite_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mutation: rename the user. Empty names abort the transaction.
    pub fn rename(new_username: String) -> MutateFn<User> {
        Box::new(move |mut user| {
            if new_username.trim().is_empty() {
                return Err(StoreError::Validation("username must not be empty".into()));
            }
            user.username = new_username;
            user.updated_at = Utc::now();
            Ok(user)
        })
    }

    pub fn adjust_follower_count(delta: i64) -> MutateFn<User> {
        Self::adjust(move |user| &mut user.follower_count, delta)
    }

    pub fn adjust_following_count(delta: i64) -> MutateFn<User> {
        Self::adjust(move |user| &mut user.following_count, delta)
    }

    pub fn adjust_favorite_count(delta: i64) -> MutateFn<User> {
        Self::adjust(move |user| &mut user.favorite_count, delta)
    }

    pub fn adjust_total_favorited(delta: i64) -> MutateFn<User> {
        Self::adjust(move |user| &mut user.total_favorited, delta)
    }

    pub fn adjust_work_count(delta: i64) -> MutateFn<User> {
        Self::adjust(move |user| &mut user.work_count, delta)
    }

    /// Counter mutation; counters never go below zero.
    fn adjust(field: impl Fn(&mut User) -> &mut i64 + Send + 'static, delta: i64) -> MutateFn<User> {
        Box::new(move |mut user| {
            let counter = field(&mut user);
            *counter = (*counter + delta).max(0);
            user.updated_at = Utc::now();
            Ok(user)
        })
    }
}

/// Key forms a user answers to; each has its own cache key and both are
/// invalidated as a set on every write.
#[derive(Debug, Clone)]
pub enum UserKey {
    Id(Uuid),
    Username(String),
}

impl Entity for User {
    type Key = UserKey;

    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            UserKey::Id(id) => self.id == *id,
            UserKey::Username(username) => self.username == *username,
        }
    }
}

impl Cacheable for User {
    const ENTITY: &'static str = "user";

    fn lookup_key(key: &Self::Key) -> String {
        match key {
            UserKey::Id(id) => CacheKey::user(*id),
            UserKey::Username(username) => CacheKey::user_by_username(username),
        }
    }

    fn invalidation_keys(&self) -> Vec<String> {
        vec![
            CacheKey::user(self.id),
            CacheKey::user_by_username(&self.username),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_clamp_at_zero() {
        let user = User::new("alice", "hash");
        let mutated = User::adjust_follower_count(-5)(user).unwrap();
        assert_eq!(mutated.follower_count, 0);
    }

    #[test]
    fn rename_rejects_empty_usernames() {
        let user = User::new("alice", "hash");
        let err = User::rename("   ".into())(user).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn invalidation_covers_both_key_forms() {
        let user = User::new("alice", "hash");
        let keys = user.invalidation_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], User::lookup_key(&UserKey::Id(user.id)));
        assert_eq!(
            keys[1],
            User::lookup_key(&UserKey::Username("alice".into()))
        );
    }
}
