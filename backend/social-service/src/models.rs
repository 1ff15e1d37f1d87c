//! Relation, Favorite and Comment aggregates
//!
//! Relations and favorites are pair entities keyed by the two IDs they
//! connect. Both flip state through `update_with_lock` rather than being
//! deleted, so the whole lifecycle stays on the sanctioned mutation path.
//! Comments are soft-deleted for the same reason.

use chrono::{DateTime, Utc};
use clip_cache::{CacheKey, Cacheable};
use entity_store::{Entity, MutateFn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "relation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    Following,
    NotFollowing,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Relation {
    pub follower_id: Uuid,
    pub followee_id: Uuid,
    pub status: RelationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(follower_id: Uuid, followee_id: Uuid, status: RelationStatus) -> Self {
        let now = Utc::now();
        Self {
            follower_id,
            followee_id,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mutation: move the relation to `status`.
    pub fn set_status(status: RelationStatus) -> MutateFn<Relation> {
        Box::new(move |mut relation| {
            relation.status = status;
            relation.updated_at = Utc::now();
            Ok(relation)
        })
    }
}

#[derive(Debug, Clone)]
pub enum RelationKey {
    Pair { follower: Uuid, followee: Uuid },
}

impl Entity for Relation {
    type Key = RelationKey;

    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            RelationKey::Pair { follower, followee } => {
                self.follower_id == *follower && self.followee_id == *followee
            }
        }
    }
}

impl Cacheable for Relation {
    const ENTITY: &'static str = "relation";

    fn lookup_key(key: &Self::Key) -> String {
        match key {
            RelationKey::Pair { follower, followee } => CacheKey::relation(*follower, *followee),
        }
    }

    fn invalidation_keys(&self) -> Vec<String> {
        vec![CacheKey::relation(self.follower_id, self.followee_id)]
    }
}

/// A (user, video) favorite marker. `active` flips instead of the row
/// being deleted, so unfavorite stays idempotent and auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Favorite {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(user_id: Uuid, video_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            video_id,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_active(active: bool) -> MutateFn<Favorite> {
        Box::new(move |mut favorite| {
            favorite.active = active;
            favorite.updated_at = Utc::now();
            Ok(favorite)
        })
    }
}

#[derive(Debug, Clone)]
pub enum FavoriteKey {
    Pair { user: Uuid, video: Uuid },
}

impl Entity for Favorite {
    type Key = FavoriteKey;

    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            FavoriteKey::Pair { user, video } => {
                self.user_id == *user && self.video_id == *video
            }
        }
    }
}

impl Cacheable for Favorite {
    const ENTITY: &'static str = "favorite";

    fn lookup_key(key: &Self::Key) -> String {
        match key {
            FavoriteKey::Pair { user, video } => CacheKey::favorite(*user, *video),
        }
    }

    fn invalidation_keys(&self) -> Vec<String> {
        vec![CacheKey::favorite(self.user_id, self.video_id)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(video_id: Uuid, user_id: Uuid, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            video_id,
            user_id,
            content: content.to_string(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_deleted() -> MutateFn<Comment> {
        Box::new(move |mut comment| {
            comment.is_deleted = true;
            comment.updated_at = Utc::now();
            Ok(comment)
        })
    }
}

#[derive(Debug, Clone)]
pub enum CommentKey {
    Id(Uuid),
}

impl Entity for Comment {
    type Key = CommentKey;

    // Soft-deleted comments are invisible to key lookups, matching the
    // `is_deleted = FALSE` filter the SQL store applies.
    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            CommentKey::Id(id) => self.id == *id && !self.is_deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_status_flip_touches_updated_at_only() {
        let relation = Relation::new(Uuid::new_v4(), Uuid::new_v4(), RelationStatus::Following);
        let flipped = Relation::set_status(RelationStatus::NotFollowing)(relation.clone()).unwrap();
        assert_eq!(flipped.status, RelationStatus::NotFollowing);
        assert_eq!(flipped.follower_id, relation.follower_id);
        assert_eq!(flipped.created_at, relation.created_at);
    }

    #[test]
    fn favorite_key_matches_exact_pair_only() {
        let favorite = Favorite::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(favorite.matches(&FavoriteKey::Pair {
            user: favorite.user_id,
            video: favorite.video_id,
        }));
        assert!(!favorite.matches(&FavoriteKey::Pair {
            user: favorite.user_id,
            video: Uuid::new_v4(),
        }));
    }
}
