//! Favorite orchestration
//!
//! Favoriting touches four rows across three stores: the favorite marker,
//! the video's favorite_count, the user's favorite_count and the video
//! author's total_favorited. The (user, video) lease keeps concurrent
//! favorite/unfavorite calls for the same pair from interleaving.

use super::release_quietly;
use crate::error::{Result, SocialError};
use crate::models::{Favorite, FavoriteKey};
use crate::repository::FavoriteQueries;
use clip_cache::CacheKey;
use dist_lock::LockManager;
use entity_store::EntityStore;
use error_types::StoreError;
use tracing::info;
use user_service::models::{User, UserKey};
use uuid::Uuid;
use video_service::models::{Video, VideoKey};

#[derive(Clone)]
pub struct FavoriteService<F, V, U> {
    favorites: F,
    videos: V,
    users: U,
    locks: LockManager,
}

impl<F, V, U> FavoriteService<F, V, U>
where
    F: EntityStore<Favorite> + FavoriteQueries,
    V: EntityStore<Video>,
    U: EntityStore<User>,
{
    pub fn new(favorites: F, videos: V, users: U, locks: LockManager) -> Self {
        Self {
            favorites,
            videos,
            users,
            locks,
        }
    }

    pub async fn favorite(&self, user_id: Uuid, video_id: Uuid) -> Result<()> {
        let video = self.require_video(video_id).await?;
        self.require_user(user_id).await?;

        let guard = self
            .locks
            .acquire(&CacheKey::favorite_lock(user_id, video_id))
            .await?;
        let outcome = self.apply(user_id, &video, true).await;
        release_quietly(guard).await;
        outcome
    }

    pub async fn unfavorite(&self, user_id: Uuid, video_id: Uuid) -> Result<()> {
        let video = self.require_video(video_id).await?;
        self.require_user(user_id).await?;

        let guard = self
            .locks
            .acquire(&CacheKey::favorite_lock(user_id, video_id))
            .await?;
        let outcome = self.apply(user_id, &video, false).await;
        release_quietly(guard).await;
        outcome
    }

    pub async fn is_favorited(&self, user_id: Uuid, video_id: Uuid) -> Result<bool> {
        let key = FavoriteKey::Pair {
            user: user_id,
            video: video_id,
        };
        match self.favorites.get(&key).await {
            Ok(favorite) => Ok(favorite.active),
            Err(StoreError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Videos this user currently favorites, most recent first.
    pub async fn favorites_of(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.favorites.list_video_ids(user_id).await?)
    }

    /// Flip the marker towards `active` and move the three counters by
    /// one, or do nothing when the marker already points that way.
    async fn apply(&self, user_id: Uuid, video: &Video, active: bool) -> Result<()> {
        let key = FavoriteKey::Pair {
            user: user_id,
            video: video.id,
        };
        match self.favorites.get(&key).await {
            Ok(favorite) if favorite.active == active => return Ok(()),
            Ok(_) => {
                self.favorites
                    .update_with_lock(&key, Favorite::set_active(active))
                    .await?;
            }
            Err(StoreError::NotFound) if active => {
                self.favorites.create(Favorite::new(user_id, video.id)).await?;
            }
            // Unfavorite of a never-favorited video: idempotent no-op.
            Err(StoreError::NotFound) => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        let delta = if active { 1 } else { -1 };
        self.videos
            .update_with_lock(&VideoKey::Id(video.id), Video::adjust_favorite_count(delta))
            .await?;
        self.users
            .update_with_lock(&UserKey::Id(user_id), User::adjust_favorite_count(delta))
            .await?;
        self.users
            .update_with_lock(
                &UserKey::Id(video.author_id),
                User::adjust_total_favorited(delta),
            )
            .await?;

        info!(user_id = %user_id, video_id = %video.id, active, "favorite state applied");
        Ok(())
    }

    async fn require_user(&self, id: Uuid) -> Result<()> {
        match self.users.get(&UserKey::Id(id)).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(SocialError::UserNotFound),
            Err(err) => Err(err.into()),
        }
    }

    async fn require_video(&self, id: Uuid) -> Result<Video> {
        match self.videos.get(&VideoKey::Id(id)).await {
            Ok(video) => Ok(video),
            Err(StoreError::NotFound) => Err(SocialError::VideoNotFound),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dist_lock::{LockConfig, MemoryLockBackend};
    use entity_store::MemoryStore;
    use std::sync::Arc;

    struct Fixture {
        service: FavoriteService<MemoryStore<Favorite>, MemoryStore<Video>, MemoryStore<User>>,
        users: MemoryStore<User>,
        videos: MemoryStore<Video>,
        viewer: User,
        author: User,
        video: Video,
    }

    async fn fixture() -> Fixture {
        let users: MemoryStore<User> =
            MemoryStore::with_hooks(|user, _| user, |a, b| a.username == b.username);
        let videos: MemoryStore<Video> = MemoryStore::new();
        let viewer = users.create(User::new("viewer", "hash")).await.unwrap();
        let author = users.create(User::new("author", "hash")).await.unwrap();
        let video = videos
            .create(Video::new(author.id, "clip", "play://1", "cover://1"))
            .await
            .unwrap();
        let locks = LockManager::new(Arc::new(MemoryLockBackend::new()), LockConfig::default());
        Fixture {
            service: FavoriteService::new(
                MemoryStore::new(),
                videos.clone(),
                users.clone(),
                locks,
            ),
            users,
            videos,
            viewer,
            author,
            video,
        }
    }

    impl Fixture {
        async fn snapshot(&self) -> (i64, i64, i64) {
            let video = self.videos.get(&VideoKey::Id(self.video.id)).await.unwrap();
            let viewer = self.users.get(&UserKey::Id(self.viewer.id)).await.unwrap();
            let author = self.users.get(&UserKey::Id(self.author.id)).await.unwrap();
            (video.favorite_count, viewer.favorite_count, author.total_favorited)
        }
    }

    #[tokio::test]
    async fn favorite_moves_all_three_counters() {
        let f = fixture().await;
        f.service.favorite(f.viewer.id, f.video.id).await.unwrap();

        assert!(f.service.is_favorited(f.viewer.id, f.video.id).await.unwrap());
        assert_eq!(f.snapshot().await, (1, 1, 1));
        assert_eq!(
            f.service.favorites_of(f.viewer.id).await.unwrap(),
            vec![f.video.id]
        );
    }

    #[tokio::test]
    async fn favorite_twice_is_idempotent() {
        let f = fixture().await;
        f.service.favorite(f.viewer.id, f.video.id).await.unwrap();
        f.service.favorite(f.viewer.id, f.video.id).await.unwrap();
        assert_eq!(f.snapshot().await, (1, 1, 1));
    }

    #[tokio::test]
    async fn unfavorite_restores_counters() {
        let f = fixture().await;
        f.service.favorite(f.viewer.id, f.video.id).await.unwrap();
        f.service.unfavorite(f.viewer.id, f.video.id).await.unwrap();

        assert!(!f.service.is_favorited(f.viewer.id, f.video.id).await.unwrap());
        assert_eq!(f.snapshot().await, (0, 0, 0));
        assert!(f.service.favorites_of(f.viewer.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unfavorite_without_favorite_is_a_noop() {
        let f = fixture().await;
        f.service.unfavorite(f.viewer.id, f.video.id).await.unwrap();
        assert_eq!(f.snapshot().await, (0, 0, 0));
    }

    #[tokio::test]
    async fn favorite_of_unknown_video_is_rejected() {
        let f = fixture().await;
        let err = f
            .service
            .favorite(f.viewer.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, SocialError::VideoNotFound));
    }

    #[tokio::test]
    async fn concurrent_favorites_count_exactly_once() {
        let f = fixture().await;
        let service = f.service.clone();
        let (a, b) = tokio::join!(
            service.favorite(f.viewer.id, f.video.id),
            f.service.favorite(f.viewer.id, f.video.id),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(f.snapshot().await, (1, 1, 1));
    }
}
