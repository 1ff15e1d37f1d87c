//! Video aggregate model

use chrono::{DateTime, Utc};
use clip_cache::{CacheKey, Cacheable};
use entity_store::{Entity, MutateFn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub play_url: String,
    pub cover_url: String,
    pub favorite_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Video {
    pub fn new(author_id: Uuid, title: &str, play_url: &str, cover_url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: title.to_string(),
            play_url: play_url.to_string(),
            cover_url: cover_url.to_string(),
            favorite_count: 0,
            comment_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn adjust_favorite_count(delta: i64) -> MutateFn<Video> {
        Box::new(move |mut video| {
            video.favorite_count = (video.favorite_count + delta).max(0);
            Ok(video)
        })
    }

    pub fn adjust_comment_count(delta: i64) -> MutateFn<Video> {
        Box::new(move |mut video| {
            video.comment_count = (video.comment_count + delta).max(0);
            Ok(video)
        })
    }
}

#[derive(Debug, Clone)]
pub enum VideoKey {
    Id(Uuid),
}

impl Entity for Video {
    type Key = VideoKey;

    fn matches(&self, key: &Self::Key) -> bool {
        match key {
            VideoKey::Id(id) => self.id == *id,
        }
    }
}

impl Cacheable for Video {
    const ENTITY: &'static str = "video";

    fn lookup_key(key: &Self::Key) -> String {
        match key {
            VideoKey::Id(id) => CacheKey::video(*id),
        }
    }

    fn invalidation_keys(&self) -> Vec<String> {
        vec![CacheKey::video(self.id)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favorite_count_never_goes_negative() {
        let video = Video::new(Uuid::new_v4(), "t", "play", "cover");
        let mutated = Video::adjust_favorite_count(-3)(video).unwrap();
        assert_eq!(mutated.favorite_count, 0);
    }
}
