//! Follow orchestration
//!
//! The one invariant here spans three store transactions: the relation
//! row plus a counter on each of the two users. A lease on the ordered
//! user pair keeps concurrent follow/unfollow calls for the same pair
//! from interleaving their counter updates; everything inside the lease
//! still goes through each store's own row lock.

use super::release_quietly;
use crate::error::{Result, SocialError};
use crate::models::{Relation, RelationKey, RelationStatus};
use crate::repository::RelationQueries;
use clip_cache::CacheKey;
use dist_lock::LockManager;
use entity_store::EntityStore;
use error_types::StoreError;
use tracing::info;
use user_service::models::{User, UserKey};
use uuid::Uuid;

#[derive(Clone)]
pub struct FollowService<R, U> {
    relations: R,
    users: U,
    locks: LockManager,
}

impl<R, U> FollowService<R, U>
where
    R: EntityStore<Relation> + RelationQueries,
    U: EntityStore<User>,
{
    pub fn new(relations: R, users: U, locks: LockManager) -> Self {
        Self {
            relations,
            users,
            locks,
        }
    }

    pub async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        self.check_pair(follower, followee).await?;

        let guard = self
            .locks
            .acquire(&CacheKey::relation_lock(follower, followee))
            .await?;
        let outcome = self.follow_locked(follower, followee).await;
        release_quietly(guard).await;
        outcome
    }

    pub async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        self.check_pair(follower, followee).await?;

        let guard = self
            .locks
            .acquire(&CacheKey::relation_lock(follower, followee))
            .await?;
        let outcome = self.unfollow_locked(follower, followee).await;
        release_quietly(guard).await;
        outcome
    }

    /// Block `followee`. An existing follow is undone first so the
    /// counters stay consistent.
    pub async fn block(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        self.check_pair(follower, followee).await?;

        let guard = self
            .locks
            .acquire(&CacheKey::relation_lock(follower, followee))
            .await?;
        let outcome = self.block_locked(follower, followee).await;
        release_quietly(guard).await;
        outcome
    }

    pub async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        let key = RelationKey::Pair { follower, followee };
        match self.relations.get(&key).await {
            Ok(relation) => Ok(relation.status == RelationStatus::Following),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn following_of(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.relations.list_following(user_id).await?)
    }

    pub async fn followers_of(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.relations.list_followers(user_id).await?)
    }

    async fn check_pair(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        if follower == followee {
            return Err(SocialError::SelfFollow);
        }
        self.require_user(follower).await?;
        self.require_user(followee).await
    }

    async fn require_user(&self, id: Uuid) -> Result<()> {
        match self.users.get(&UserKey::Id(id)).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(SocialError::UserNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn follow_locked(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        let key = RelationKey::Pair { follower, followee };
        match self.relations.get(&key).await {
            // Already following: nothing to do, counters untouched.
            Ok(relation) if relation.status == RelationStatus::Following => return Ok(()),
            Ok(relation) if relation.status == RelationStatus::Blocked => {
                return Err(SocialError::RelationBlocked)
            }
            Ok(_) => {
                self.relations
                    .update_with_lock(&key, Relation::set_status(RelationStatus::Following))
                    .await?;
            }
            Err(StoreError::NotFound) => {
                self.relations
                    .create(Relation::new(follower, followee, RelationStatus::Following))
                    .await?;
            }
            Err(err) => return Err(err.into()),
        }

        self.users
            .update_with_lock(&UserKey::Id(follower), User::adjust_following_count(1))
            .await?;
        self.users
            .update_with_lock(&UserKey::Id(followee), User::adjust_follower_count(1))
            .await?;
        info!(follower_id = %follower, followee_id = %followee, "follow applied");
        Ok(())
    }

    async fn unfollow_locked(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        let key = RelationKey::Pair { follower, followee };
        match self.relations.get(&key).await {
            Ok(relation) if relation.status == RelationStatus::Following => {
                self.relations
                    .update_with_lock(&key, Relation::set_status(RelationStatus::NotFollowing))
                    .await?;
            }
            // Not currently following: idempotent no-op.
            Ok(_) | Err(StoreError::NotFound) => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        self.users
            .update_with_lock(&UserKey::Id(follower), User::adjust_following_count(-1))
            .await?;
        self.users
            .update_with_lock(&UserKey::Id(followee), User::adjust_follower_count(-1))
            .await?;
        info!(follower_id = %follower, followee_id = %followee, "unfollow applied");
        Ok(())
    }

    async fn block_locked(&self, follower: Uuid, followee: Uuid) -> Result<()> {
        let key = RelationKey::Pair { follower, followee };
        let was_following = match self.relations.get(&key).await {
            Ok(relation) if relation.status == RelationStatus::Blocked => return Ok(()),
            Ok(relation) => {
                let was_following = relation.status == RelationStatus::Following;
                self.relations
                    .update_with_lock(&key, Relation::set_status(RelationStatus::Blocked))
                    .await?;
                was_following
            }
            Err(StoreError::NotFound) => {
                self.relations
                    .create(Relation::new(follower, followee, RelationStatus::Blocked))
                    .await?;
                false
            }
            Err(err) => return Err(err.into()),
        };

        if was_following {
            self.users
                .update_with_lock(&UserKey::Id(follower), User::adjust_following_count(-1))
                .await?;
            self.users
                .update_with_lock(&UserKey::Id(followee), User::adjust_follower_count(-1))
                .await?;
        }
        info!(follower_id = %follower, followee_id = %followee, "block applied");
        Ok(())
    }
}
