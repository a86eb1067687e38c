//! Error types for session and token storage

/// Errors from session and access-token operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid password")]
    InvalidPassword,
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Store(e.to_string())
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
