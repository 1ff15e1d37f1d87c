use error_types::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UserError>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("username is taken")]
    UsernameTaken,

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => UserError::UsernameTaken,
            other => UserError::Store(other),
        }
    }
}

impl UserError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            UserError::UsernameTaken => "username_taken",
            UserError::InvalidUsername(_) => "invalid_username",
            UserError::Store(err) => err.code(),
        }
    }
}
