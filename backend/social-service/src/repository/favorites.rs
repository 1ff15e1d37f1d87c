//! Postgres favorite store

use crate::models::{Favorite, FavoriteKey};
use async_trait::async_trait;
use clip_cache::CachedStore;
use entity_store::{EntityStore, MemoryStore, MutateFn};
use error_types::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const FAVORITE_COLUMNS: &str = "user_id, video_id, active, created_at, updated_at";

/// Read-only listing queries over favorites.
#[async_trait]
pub trait FavoriteQueries: Send + Sync {
    /// Videos this user currently favorites, most recent first.
    async fn list_video_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct PgFavoriteStore {
    pool: PgPool,
}

impl PgFavoriteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Favorite> for PgFavoriteStore {
    async fn get(&self, key: &FavoriteKey) -> StoreResult<Favorite> {
        let FavoriteKey::Pair { user, video } = key;
        let favorite: Option<Favorite> = sqlx::query_as(&format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites WHERE user_id = $1 AND video_id = $2"
        ))
        .bind(user)
        .bind(video)
        .fetch_optional(&self.pool)
        .await?;
        favorite.ok_or(StoreError::NotFound)
    }

    async fn create(&self, favorite: Favorite) -> StoreResult<Favorite> {
        let created: Favorite = sqlx::query_as(&format!(
            r#"
            INSERT INTO favorites (user_id, video_id, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FAVORITE_COLUMNS}
            "#
        ))
        .bind(favorite.user_id)
        .bind(favorite.video_id)
        .bind(favorite.active)
        .bind(favorite.created_at)
        .bind(favorite.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = %created.user_id, video_id = %created.video_id, "favorite created");
        Ok(created)
    }

    async fn update_with_lock(
        &self,
        key: &FavoriteKey,
        mutate: MutateFn<Favorite>,
    ) -> StoreResult<Favorite> {
        let FavoriteKey::Pair { user, video } = key;
        let mut tx = self.pool.begin().await?;

        let locked: Option<Favorite> = sqlx::query_as(&format!(
            r#"
            SELECT {FAVORITE_COLUMNS} FROM favorites
            WHERE user_id = $1 AND video_id = $2
            FOR UPDATE
            "#
        ))
        .bind(user)
        .bind(video)
        .fetch_optional(&mut *tx)
        .await?;
        let locked = locked.ok_or(StoreError::NotFound)?;
        let (locked_user, locked_video) = (locked.user_id, locked.video_id);

        let updated = mutate(locked)?;
        if updated.user_id != locked_user || updated.video_id != locked_video {
            return Err(StoreError::Validation("entity identity is immutable".into()));
        }

        sqlx::query(
            r#"
            UPDATE favorites
            SET active = $3, updated_at = $4
            WHERE user_id = $1 AND video_id = $2
            "#,
        )
        .bind(updated.user_id)
        .bind(updated.video_id)
        .bind(updated.active)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %updated.user_id, video_id = %updated.video_id, "favorite updated under row lock");
        Ok(updated)
    }
}

#[async_trait]
impl FavoriteQueries for PgFavoriteStore {
    async fn list_video_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT video_id FROM favorites
            WHERE user_id = $1 AND active = TRUE
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl<S> FavoriteQueries for CachedStore<S, Favorite>
where
    S: EntityStore<Favorite> + FavoriteQueries,
{
    async fn list_video_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner().list_video_ids(user_id).await
    }
}

#[async_trait]
impl FavoriteQueries for MemoryStore<Favorite> {
    async fn list_video_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut rows: Vec<Favorite> = self
            .dump()
            .await
            .into_iter()
            .filter(|f| f.user_id == user_id && f.active)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows.into_iter().map(|f| f.video_id).collect())
    }
}
