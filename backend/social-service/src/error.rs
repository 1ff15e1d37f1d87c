use error_types::{LockError, StoreError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SocialError>;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("a user cannot follow themselves")]
    SelfFollow,

    #[error("relation is blocked")]
    RelationBlocked,

    #[error("user not found")]
    UserNotFound,

    #[error("video not found")]
    VideoNotFound,

    #[error("comment not found")]
    CommentNotFound,

    #[error("only the comment author may delete it")]
    NotCommentAuthor,

    #[error("comment content must not be empty")]
    EmptyComment,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SocialError {
    pub fn code(&self) -> &'static str {
        match self {
            SocialError::SelfFollow => "self_follow",
            SocialError::RelationBlocked => "relation_blocked",
            SocialError::UserNotFound => "user_not_found",
            SocialError::VideoNotFound => "video_not_found",
            SocialError::CommentNotFound => "comment_not_found",
            SocialError::NotCommentAuthor => "not_comment_author",
            SocialError::EmptyComment => "empty_comment",
            SocialError::Lock(err) => err.code(),
            SocialError::Store(err) => err.code(),
        }
    }

    /// Lock contention is the one condition callers should retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SocialError::Lock(err) => err.is_retryable(),
            SocialError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}
