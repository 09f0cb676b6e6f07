use crate::error::ShortenerError;
use crate::storage::{UserId, UserUrl};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ShortenerError>;

/// The outcome of encoding a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// The composed short URL.
    pub short_url: String,
    /// `true` when the URL already had a code and nothing was created.
    pub conflict: bool,
}

/// One entry of a batch encode request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUrl {
    pub correlation_id: String,
    pub original_url: String,
}

/// One entry of a batch encode response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// The capability set consumed by the HTTP layer.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Resolves a session token into the user id it was issued for.
    fn auth(&self, token: &str) -> Result<UserId>;

    /// Allocates a new user id and issues a token for it.
    fn create_token(&self) -> Result<(UserId, String)>;

    /// Returns the short URL for `url`, creating a mapping if needed.
    async fn encode_url(&self, user_id: UserId, url: &str) -> Result<Encoded>;

    /// Encodes many URLs at once. Entries whose chunk failed to persist are
    /// left out of the result.
    async fn batch_encode_url(&self, user_id: UserId, batch: Vec<BatchUrl>) -> Vec<BatchResult>;

    /// Resolves a short code back into its original URL.
    async fn decode_url(&self, code: &str) -> Result<String>;

    /// Lists every mapping owned by `user_id`.
    async fn get_user_urls(&self, user_id: UserId) -> Vec<UserUrl>;

    /// Schedules a soft delete of `codes` owned by `user_id` and returns
    /// immediately.
    fn delete_user_urls(&self, user_id: UserId, codes: Vec<String>);
}
