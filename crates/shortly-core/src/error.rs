use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("url already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("transaction rolled back: {0}")]
    Transaction(String),
    #[error("storage io failed: {0}")]
    Io(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid short url: {0}")]
    NotFound(String),
    #[error("short url is deleted: {0}")]
    Gone(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("authorization required")]
    NeedAuthorization,
    #[error("token carries no user id")]
    InvalidAuthorization,
    #[error("token error: {0}")]
    Token(String),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Unavailable(message) => Self::StorageUnavailable(message),
            StorageError::Timeout(message) => Self::Timeout(message),
            other => Self::Storage(other.to_string()),
        }
    }
}
