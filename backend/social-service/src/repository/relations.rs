//! Postgres relation store
//!
//! A relation row exists once per ordered (follower, followee) pair and
//! only its status changes after insertion.

use crate::models::{Relation, RelationKey, RelationStatus};
use async_trait::async_trait;
use clip_cache::CachedStore;
use entity_store::{EntityStore, MemoryStore, MutateFn};
use error_types::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const RELATION_COLUMNS: &str = "follower_id, followee_id, status, created_at, updated_at";

/// Read-only listing queries over relations.
#[async_trait]
pub trait RelationQueries: Send + Sync {
    /// IDs this user follows, most recent first.
    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// IDs following this user, most recent first.
    async fn list_followers(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct PgRelationStore {
    pool: PgPool,
}

impl PgRelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Relation> for PgRelationStore {
    async fn get(&self, key: &RelationKey) -> StoreResult<Relation> {
        let RelationKey::Pair { follower, followee } = key;
        let relation: Option<Relation> = sqlx::query_as(&format!(
            "SELECT {RELATION_COLUMNS} FROM relations WHERE follower_id = $1 AND followee_id = $2"
        ))
        .bind(follower)
        .bind(followee)
        .fetch_optional(&self.pool)
        .await?;
        relation.ok_or(StoreError::NotFound)
    }

    async fn create(&self, relation: Relation) -> StoreResult<Relation> {
        let created: Relation = sqlx::query_as(&format!(
            r#"
            INSERT INTO relations (follower_id, followee_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RELATION_COLUMNS}
            "#
        ))
        .bind(relation.follower_id)
        .bind(relation.followee_id)
        .bind(relation.status)
        .bind(relation.created_at)
        .bind(relation.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            follower_id = %created.follower_id,
            followee_id = %created.followee_id,
            "relation created"
        );
        Ok(created)
    }

    async fn update_with_lock(
        &self,
        key: &RelationKey,
        mutate: MutateFn<Relation>,
    ) -> StoreResult<Relation> {
        let RelationKey::Pair { follower, followee } = key;
        let mut tx = self.pool.begin().await?;

        let locked: Option<Relation> = sqlx::query_as(&format!(
            r#"
            SELECT {RELATION_COLUMNS} FROM relations
            WHERE follower_id = $1 AND followee_id = $2
            FOR UPDATE
            "#
        ))
        .bind(follower)
        .bind(followee)
        .fetch_optional(&mut *tx)
        .await?;
        let locked = locked.ok_or(StoreError::NotFound)?;
        let (locked_follower, locked_followee) = (locked.follower_id, locked.followee_id);

        let updated = mutate(locked)?;
        if updated.follower_id != locked_follower || updated.followee_id != locked_followee {
            return Err(StoreError::Validation("entity identity is immutable".into()));
        }

        sqlx::query(
            r#"
            UPDATE relations
            SET status = $3, updated_at = $4
            WHERE follower_id = $1 AND followee_id = $2
            "#,
        )
        .bind(updated.follower_id)
        .bind(updated.followee_id)
        .bind(updated.status)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(
            follower_id = %updated.follower_id,
            followee_id = %updated.followee_id,
            "relation updated under row lock"
        );
        Ok(updated)
    }
}

#[async_trait]
impl RelationQueries for PgRelationStore {
    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT followee_id FROM relations
            WHERE follower_id = $1 AND status = 'following'
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_followers(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT follower_id FROM relations
            WHERE followee_id = $1 AND status = 'following'
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// Listings pass through the cache decorator untouched.
#[async_trait]
impl<S> RelationQueries for CachedStore<S, Relation>
where
    S: EntityStore<Relation> + RelationQueries,
{
    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner().list_following(user_id).await
    }

    async fn list_followers(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner().list_followers(user_id).await
    }
}

#[async_trait]
impl RelationQueries for MemoryStore<Relation> {
    async fn list_following(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut rows: Vec<Relation> = self
            .dump()
            .await
            .into_iter()
            .filter(|r| r.follower_id == user_id && r.status == RelationStatus::Following)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows.into_iter().map(|r| r.followee_id).collect())
    }

    async fn list_followers(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut rows: Vec<Relation> = self
            .dump()
            .await
            .into_iter()
            .filter(|r| r.followee_id == user_id && r.status == RelationStatus::Following)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows.into_iter().map(|r| r.follower_id).collect())
    }
}
