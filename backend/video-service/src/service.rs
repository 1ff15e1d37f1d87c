//! Video application service

use crate::error::{Result, VideoError};
use crate::models::{Video, VideoKey};
use crate::repository::VideoQueries;
use chrono::{DateTime, Utc};
use entity_store::EntityStore;
use error_types::StoreError;
use tracing::info;
use user_service::models::{User, UserKey};
use uuid::Uuid;

/// Hard cap on the feed page size, matching the wire contract.
pub const MAX_FEED_PAGE: i64 = 30;

pub struct VideoService<V, U> {
    videos: V,
    users: U,
    page_size: i64,
}

impl<V, U> VideoService<V, U>
where
    V: EntityStore<Video> + VideoQueries,
    U: EntityStore<User>,
{
    pub fn new(videos: V, users: U) -> Self {
        Self {
            videos,
            users,
            page_size: MAX_FEED_PAGE,
        }
    }

    /// Override the feed page size, clamped to [`MAX_FEED_PAGE`].
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.clamp(1, MAX_FEED_PAGE);
        self
    }

    /// Publish a video and bump the author's work count. The counter bump
    /// is an unconditional increment serialized by the author's row lock,
    /// so no cross-store lease is needed here.
    pub async fn publish(
        &self,
        author_id: Uuid,
        title: &str,
        play_url: &str,
        cover_url: &str,
    ) -> Result<Video> {
        if title.trim().is_empty() {
            return Err(VideoError::InvalidMetadata("title must not be empty".into()));
        }
        if play_url.trim().is_empty() {
            return Err(VideoError::InvalidMetadata(
                "play_url must not be empty".into(),
            ));
        }

        // Fail before creating the row for an unknown author.
        self.users
            .get(&UserKey::Id(author_id))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => VideoError::AuthorNotFound,
                other => VideoError::Store(other),
            })?;

        let video = self
            .videos
            .create(Video::new(author_id, title, play_url, cover_url))
            .await?;

        self.users
            .update_with_lock(&UserKey::Id(author_id), User::adjust_work_count(1))
            .await?;

        info!(video_id = %video.id, author_id = %author_id, "video published");
        Ok(video)
    }

    pub async fn video(&self, id: Uuid) -> Result<Video> {
        Ok(self.videos.get(&VideoKey::Id(id)).await?)
    }

    /// Most recent videos before `latest_before` (defaults to now),
    /// newest first, one page at most.
    pub async fn feed(&self, latest_before: Option<DateTime<Utc>>) -> Result<Vec<Video>> {
        let before = latest_before.unwrap_or_else(Utc::now);
        Ok(self.videos.feed(before, self.page_size).await?)
    }

    pub async fn videos_of(&self, author_id: Uuid) -> Result<Vec<Video>> {
        Ok(self.videos.list_by_author(author_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_store::MemoryStore;

    fn user_store() -> MemoryStore<User> {
        MemoryStore::with_hooks(|user, _| user, |a, b| a.username == b.username)
    }

    fn service() -> (
        VideoService<MemoryStore<Video>, MemoryStore<User>>,
        MemoryStore<User>,
    ) {
        let users = user_store();
        (
            VideoService::new(MemoryStore::new(), users.clone()),
            users,
        )
    }

    async fn seeded_author(users: &MemoryStore<User>) -> User {
        users.create(User::new("alice", "hash")).await.unwrap()
    }

    #[tokio::test]
    async fn publish_round_trips_and_bumps_work_count() {
        let (service, users) = service();
        let author = seeded_author(&users).await;

        let video = service
            .publish(author.id, "first clip", "play://1", "cover://1")
            .await
            .unwrap();
        assert_eq!(service.video(video.id).await.unwrap(), video);

        let author = users.get(&UserKey::Id(author.id)).await.unwrap();
        assert_eq!(author.work_count, 1);
    }

    #[tokio::test]
    async fn publish_rejects_unknown_author() {
        let (service, _users) = service();
        let err = service
            .publish(Uuid::new_v4(), "clip", "play://1", "cover://1")
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::AuthorNotFound));
    }

    #[tokio::test]
    async fn publish_validates_metadata() {
        let (service, users) = service();
        let author = seeded_author(&users).await;
        let err = service
            .publish(author.id, "  ", "play://1", "cover://1")
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::InvalidMetadata(_)));
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_bounded() {
        let (service, users) = service();
        let author = seeded_author(&users).await;

        for i in 0..3 {
            service
                .publish(author.id, &format!("clip {i}"), "play://x", "cover://x")
                .await
                .unwrap();
        }

        let feed = service.feed(None).await.unwrap();
        assert_eq!(feed.len(), 3);
        assert!(feed.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let of_author = service.videos_of(author.id).await.unwrap();
        assert_eq!(of_author.len(), 3);
    }

    #[tokio::test]
    async fn feed_honors_the_configured_page_size() {
        let users = user_store();
        let videos: MemoryStore<Video> = MemoryStore::new();
        let author = users.create(User::new("alice", "hash")).await.unwrap();
        let service = VideoService::new(videos, users).with_page_size(2);

        for i in 0..3 {
            service
                .publish(author.id, &format!("clip {i}"), "play://x", "cover://x")
                .await
                .unwrap();
        }
        assert_eq!(service.feed(None).await.unwrap().len(), 2);
    }
}
