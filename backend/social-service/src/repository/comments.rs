//! Postgres comment store
//!
//! Comments are read as per-video listings, so they carry no per-ID cache
//! projection; the store is used bare. Deletion is a soft flag flip
//! through the transactional update path.

use crate::models::{Comment, CommentKey};
use async_trait::async_trait;
use entity_store::{EntityStore, MemoryStore, MutateFn};
use error_types::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const COMMENT_COLUMNS: &str = "id, video_id, user_id, content, is_deleted, created_at, updated_at";

/// Read-only listing queries over comments.
#[async_trait]
pub trait CommentQueries: Send + Sync {
    /// Live comments on a video, newest first.
    async fn list_by_video(&self, video_id: Uuid) -> StoreResult<Vec<Comment>>;
}

#[derive(Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<Comment> for PgCommentStore {
    async fn get(&self, key: &CommentKey) -> StoreResult<Comment> {
        let CommentKey::Id(id) = key;
        let comment: Option<Comment> = sqlx::query_as(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        comment.ok_or(StoreError::NotFound)
    }

    async fn create(&self, comment: Comment) -> StoreResult<Comment> {
        let created: Comment = sqlx::query_as(&format!(
            r#"
            INSERT INTO comments (id, video_id, user_id, content, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(comment.id)
        .bind(comment.video_id)
        .bind(comment.user_id)
        .bind(&comment.content)
        .bind(comment.is_deleted)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(comment_id = %created.id, video_id = %created.video_id, "comment created");
        Ok(created)
    }

    async fn update_with_lock(
        &self,
        key: &CommentKey,
        mutate: MutateFn<Comment>,
    ) -> StoreResult<Comment> {
        let CommentKey::Id(id) = key;
        let mut tx = self.pool.begin().await?;

        let locked: Option<Comment> = sqlx::query_as(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1 AND is_deleted = FALSE FOR UPDATE"
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
            UPDATE comments
            SET content = $2, is_deleted = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(updated.id)
        .bind(&updated.content)
        .bind(updated.is_deleted)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(comment_id = %updated.id, "comment updated under row lock");
        Ok(updated)
    }
}

#[async_trait]
impl CommentQueries for PgCommentStore {
    async fn list_by_video(&self, video_id: Uuid) -> StoreResult<Vec<Comment>> {
        let comments: Vec<Comment> = sqlx::query_as(&format!(
            r#"
            SELECT {COMMENT_COLUMNS} FROM comments
            WHERE video_id = $1 AND is_deleted = FALSE
            ORDER BY created_at DESC
            "#
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}

#[async_trait]
impl CommentQueries for MemoryStore<Comment> {
    async fn list_by_video(&self, video_id: Uuid) -> StoreResult<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .dump()
            .await
            .into_iter()
            .filter(|c| c.video_id == video_id && !c.is_deleted)
            .collect();
        // Equal timestamps fall back to ID order so listings stay deterministic.
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }
}
