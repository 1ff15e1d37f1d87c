//! Shared error taxonomy for the storage core
//!
//! Every entity store and the distributed lock speak the same small set of
//! error variants so that callers can route on them without knowing which
//! backing technology produced the failure.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Errors surfaced by entity stores.
///
/// `Validation` is reserved for domain errors raised by a caller-supplied
/// mutation closure; it aborts the surrounding transaction without a write
/// and must stay distinct from `Storage`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity not found")]
    NotFound,

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound => "not_found",
            StoreError::Conflict(_) => "conflict",
            StoreError::Validation(_) => "validation",
            StoreError::Storage(_) => "storage",
        }
    }

    /// Whether a caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

/// SQLSTATE class for unique constraint violations.
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => {
                if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) {
                    StoreError::Conflict(db.message().to_string())
                } else {
                    StoreError::Storage(db.message().to_string())
                }
            }
            _ => StoreError::Storage(err.to_string()),
        }
    }
}

/// Errors surfaced by the distributed lock.
///
/// `Timeout` and `AlreadyHeld` are retryable conditions; the application
/// service decides whether to retry. `Backend` is a coordination-service
/// failure and is not. Caller cancellation never surfaces as an error:
/// dropping an acquire future holds nothing, and an abandoned lease
/// expires via its TTL.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock acquisition timed out")]
    Timeout,

    #[error("lock already held by another session")]
    AlreadyHeld,

    #[error("lock backend failure: {0}")]
    Backend(String),
}

impl LockError {
    pub fn code(&self) -> &'static str {
        match self {
            LockError::Timeout => "lock_timeout",
            LockError::AlreadyHeld => "lock_already_held",
            LockError::Backend(_) => "lock_backend",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Timeout | LockError::AlreadyHeld)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_codes_are_stable() {
        assert_eq!(StoreError::NotFound.code(), "not_found");
        assert_eq!(StoreError::Conflict("dup".into()).code(), "conflict");
        assert_eq!(StoreError::Validation("bad".into()).code(), "validation");
        assert_eq!(StoreError::Storage("io".into()).code(), "storage");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn retryability_split() {
        assert!(StoreError::Storage("conn reset".into()).is_retryable());
        assert!(!StoreError::Conflict("dup".into()).is_retryable());
        assert!(LockError::Timeout.is_retryable());
        assert!(!LockError::Backend("down".into()).is_retryable());
    }
}
