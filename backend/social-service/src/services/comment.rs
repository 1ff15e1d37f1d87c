//! Comment orchestration
//!
//! The comment row and the video's comment_count live in different
//! stores, but both updates are unconditional, so the row locks inside
//! each `update_with_lock` are enough; no cross-store lease is taken.

use crate::error::{Result, SocialError};
use crate::models::{Comment, CommentKey};
use crate::repository::CommentQueries;
use entity_store::EntityStore;
use error_types::StoreError;
use tracing::info;
use uuid::Uuid;
use video_service::models::{Video, VideoKey};

#[derive(Clone)]
pub struct CommentService<C, V> {
    comments: C,
    videos: V,
}

impl<C, V> CommentService<C, V>
where
    C: EntityStore<Comment> + CommentQueries,
    V: EntityStore<Video>,
{
    pub fn new(comments: C, videos: V) -> Self {
        Self { comments, videos }
    }

    pub async fn post_comment(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SocialError::EmptyComment);
        }
        self.require_video(video_id).await?;

        let comment = self
            .comments
            .create(Comment::new(video_id, user_id, content))
            .await?;
        self.videos
            .update_with_lock(&VideoKey::Id(video_id), Video::adjust_comment_count(1))
            .await?;

        info!(comment_id = %comment.id, video_id = %video_id, "comment posted");
        Ok(comment)
    }

    /// Soft-delete a comment. Only its author may do so.
    pub async fn delete_comment(&self, comment_id: Uuid, requester: Uuid) -> Result<()> {
        let comment = match self.comments.get(&CommentKey::Id(comment_id)).await {
            Ok(comment) => comment,
            Err(StoreError::NotFound) => return Err(SocialError::CommentNotFound),
            Err(err) => return Err(err.into()),
        };
        if comment.user_id != requester {
            return Err(SocialError::NotCommentAuthor);
        }

        // The pre-check is not a reservation: a concurrent delete can win
        // the row lock between the get and this update, so NotFound here
        // still means the comment is gone, not a storage fault.
        match self
            .comments
            .update_with_lock(&CommentKey::Id(comment_id), Comment::mark_deleted())
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(SocialError::CommentNotFound),
            Err(err) => return Err(err.into()),
        }
        self.videos
            .update_with_lock(
                &VideoKey::Id(comment.video_id),
                Video::adjust_comment_count(-1),
            )
            .await?;

        info!(comment_id = %comment_id, video_id = %comment.video_id, "comment deleted");
        Ok(())
    }

    pub async fn comments_of(&self, video_id: Uuid) -> Result<Vec<Comment>> {
        Ok(self.comments.list_by_video(video_id).await?)
    }

    async fn require_video(&self, id: Uuid) -> Result<()> {
        match self.videos.get(&VideoKey::Id(id)).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(SocialError::VideoNotFound),
            Err(err) => Err(err.into()),
        }
    }
}
