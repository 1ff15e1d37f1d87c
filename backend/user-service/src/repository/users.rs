//! Postgres user store
//!
//! `update_with_lock` is the transactional updater: it takes the row
//! under `SELECT ... FOR UPDATE`, applies the caller's mutation to the
//! locked snapshot and commits, rolling back on every error path (an
//! early return drops the transaction, which sqlx rolls back).

use crate::models::{User, UserKey};
use async_trait::async_trait;
use chrono::Utc;
use entity_store::{EntityStore, MutateFn};
use error_types::{StoreError, StoreResult};
use sqlx::PgPool;
use tracing::debug;

const USER_COLUMNS: &str = "id, username, password_hash, following_count, follower_count, \
     total_favorited, work_count, favorite_count, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore<User> for PgUserStore {
    async fn get(&self, key: &UserKey) -> StoreResult<User> {
        let user: Option<User> = match key {
            UserKey::Id(id) => {
                sqlx::query_as(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
                ))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            UserKey::Username(username) => {
                sqlx::query_as(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
                ))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        user.ok_or(StoreError::NotFound)
    }

    async fn create(&self, user: User) -> StoreResult<User> {
        let created: User = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, username, password_hash, following_count, follower_count,
                               total_favorited, work_count, favorite_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.following_count)
        .bind(user.follower_count)
        .bind(user.total_favorited)
        .bind(user.work_count)
        .bind(user.favorite_count)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = %created.id, username = %created.username, "user created");
        Ok(created)
    }

    async fn update_with_lock(&self, key: &UserKey, mutate: MutateFn<User>) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<User> = match key {
            UserKey::Id(id) => {
                sqlx::query_as(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
                ))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
            }
            UserKey::Username(username) => {
                sqlx::query_as(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username = $1 FOR UPDATE"
                ))
                .bind(username)
                .fetch_optional(&mut *tx)
                .await?
            }
        };
        let locked = locked.ok_or(StoreError::NotFound)?;
        let locked_id = locked.id;

        let mut updated = mutate(locked)?;
        if updated.id != locked_id {
            return Err(StoreError::Validation("entity identity is immutable".into()));
        }
        updated.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, following_count = $4, follower_count = $5,
                total_favorited = $6, work_count = $7, favorite_count = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(updated.id)
        .bind(&updated.username)
        .bind(&updated.password_hash)
        .bind(updated.following_count)
        .bind(updated.follower_count)
        .bind(updated.total_favorited)
        .bind(updated.work_count)
        .bind(updated.favorite_count)
        .bind(updated.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(user_id = %updated.id, "user updated under row lock");
        Ok(updated)
    }
}
