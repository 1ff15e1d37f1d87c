use error_types::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VideoError>;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("author not found")]
    AuthorNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VideoError {
    pub fn code(&self) -> &'static str {
        match self {
            VideoError::InvalidMetadata(_) => "invalid_metadata",
            VideoError::AuthorNotFound => "author_not_found",
            VideoError::Store(err) => err.code(),
        }
    }
}
