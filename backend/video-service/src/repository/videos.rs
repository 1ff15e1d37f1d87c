//! Postgres video store and list queries
//!
//! Point lookups and counter updates go through the `EntityStore`
//! contract; the feed and per-author listings are read-only queries with
//! no cache projection.

use crate::models::{Video, VideoKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clip_cache::CachedStore;
use entity_store::{EntityStore, MemoryStore, MutateFn};
use error_types::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const VIDEO_COLUMNS: &str =
    "id, author_id, title, play_url, cover_url, favorite_count, comment_count, created_at";

/// Read-only listing queries over videos.
#[async_trait]
pub trait VideoQueries: Send + Sync {
    /// Most recent videos created strictly before `latest_before`,
    /// newest first.
    async fn feed(&self, latest_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Video>>;

    /// All videos by one author, newest first.
    async fn list_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Video>>;
}

#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Video> for PgVideoStore {
    async fn get(&self, key: &VideoKey) -> StoreResult<Video> {
        let VideoKey::Id(id) = key;
        let video: Option<Video> = sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        video.ok_or(StoreError::NotFound)
    }

    async fn create(&self, video: Video) -> StoreResult<Video> {
        let created: Video = sqlx::query_as(&format!(
            r#"
            INSERT INTO videos (id, author_id, title, play_url, cover_url,
                                favorite_count, comment_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {VIDEO_COLUMNS}
            "#
        ))
        .bind(video.id)
        .bind(video.author_id)
        .bind(&video.title)
        .bind(&video.play_url)
        .bind(&video.cover_url)
        .bind(video.favorite_count)
        .bind(video.comment_count)
        .bind(video.created_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(video_id = %created.id, author_id = %created.author_id, "video created");
        Ok(created)
    }

    async fn update_with_lock(&self, key: &VideoKey, mutate: MutateFn<Video>) -> StoreResult<Video> {
        let VideoKey::Id(id) = key;
        let mut tx = self.pool.begin().await?;

        let locked: Option<Video> = sqlx::query_as(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let locked = locked.ok_or(StoreError::NotFound)?;
        let locked_id = locked.id;

        let updated = mutate(locked)?;
        if updated.id != locked_id {
            return Err(StoreError::Validation("entity identity is immutable".into()));
        }

        sqlx::query(
            r#"
            UPDATE videos
            SET title = $2, play_url = $3, cover_url = $4,
                favorite_count = $5, comment_count = $6
            WHERE id = $1
            "#,
        )
        .bind(updated.id)
        .bind(&updated.title)
        .bind(&updated.play_url)
        .bind(&updated.cover_url)
        .bind(updated.favorite_count)
        .bind(updated.comment_count)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(video_id = %updated.id, "video updated under row lock");
        Ok(updated)
    }
}

#[async_trait]
impl VideoQueries for PgVideoStore {
    async fn feed(&self, latest_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Video>> {
        let videos: Vec<Video> = sqlx::query_as(&format!(
            r#"
            SELECT {VIDEO_COLUMNS} FROM videos
            WHERE created_at < $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(latest_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }

    async fn list_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Video>> {
        let videos: Vec<Video> = sqlx::query_as(&format!(
            r#"
            SELECT {VIDEO_COLUMNS} FROM videos
            WHERE author_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(videos)
    }
}

/// List queries pass through the cache decorator untouched.
#[async_trait]
impl<S> VideoQueries for CachedStore<S, Video>
where
    S: EntityStore<Video> + VideoQueries,
{
    async fn feed(&self, latest_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Video>> {
        self.inner().feed(latest_before, limit).await
    }

    async fn list_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Video>> {
        self.inner().list_by_author(author_id).await
    }
}

/// In-memory equivalent of the SQL listings, for tests and development.
#[async_trait]
impl VideoQueries for MemoryStore<Video> {
    async fn feed(&self, latest_before: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Video>> {
        let mut videos: Vec<Video> = self
            .dump()
            .await
            .into_iter()
            .filter(|v| v.created_at < latest_before)
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        videos.truncate(limit.max(0) as usize);
        Ok(videos)
    }

    async fn list_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Video>> {
        let mut videos: Vec<Video> = self
            .dump()
            .await
            .into_iter()
            .filter(|v| v.author_id == author_id)
            .collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }
}
