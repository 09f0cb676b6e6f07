use crate::error::Result;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of the user owning a mapping.
///
/// Stored ids are always `>= 1`. `0` and `-1` only appear at the auth
/// boundary and are never persisted.
pub type UserId = i64;

/// The result of looking a short code up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlLookup {
    /// The original URL that was shortened.
    pub url: String,
    /// Whether the owner has soft-deleted the mapping.
    pub is_deleted: bool,
}

/// One mapping owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    #[serde(rename = "short_url")]
    pub code: ShortCode,
    #[serde(rename = "original_url")]
    pub url: String,
}

/// A `(url, code)` pair handed to [`Storage::insert_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlCodePair {
    pub url: String,
    pub code: ShortCode,
}

impl UrlCodePair {
    pub fn new(url: impl Into<String>, code: ShortCode) -> Self {
        Self {
            url: url.into(),
            code,
        }
    }
}

/// The storage contract shared by the memory, file and database backends.
///
/// Lookup misses are part of the normal result shape (`Ok(None)`, a partial
/// map); only genuine failures are returned as errors. Implementations are
/// internally synchronized, callers that need read-then-write atomicity
/// across calls must hold their own lock.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Prepares the underlying storage: opens connections, creates the
    /// schema, or loads the snapshot file. Called once at startup.
    async fn init(&self) -> Result<()>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Exact-match lookup by original URL.
    async fn get_code(&self, url: &str) -> Result<Option<ShortCode>>;

    /// Returns the subset of `urls` that already have a code.
    ///
    /// Callers compute the complement themselves.
    async fn get_code_batch(&self, urls: &[String]) -> Result<HashMap<String, ShortCode>>;

    /// Exact-match lookup by code.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlLookup>>;

    /// Highest owner id currently stored, `0` if the storage is empty.
    async fn get_max_user_id(&self) -> Result<UserId>;

    /// All mappings owned by `user_id`, ordered by URL. Soft-deleted mappings
    /// are included.
    async fn get_user_urls(&self, user_id: UserId) -> Result<Vec<UserUrl>>;

    /// Stores one mapping. Inserting a URL that already has a code is a no-op.
    async fn insert(&self, user_id: UserId, url: &str, code: &ShortCode) -> Result<()>;

    /// Stores many mappings. Either every pair is stored or none is.
    async fn insert_batch(&self, user_id: UserId, batch: &[UrlCodePair]) -> Result<()>;

    /// Marks every code in `codes` owned by `user_id` as deleted and returns
    /// how many were marked. Unknown or foreign codes are skipped.
    async fn delete_batch(&self, user_id: UserId, codes: &[ShortCode]) -> Result<u64>;

    /// Total number of mappings, soft-deleted ones included.
    async fn count(&self) -> Result<u64>;

    /// Removes every mapping.
    async fn truncate(&self) -> Result<()>;

    /// Releases the underlying resources.
    async fn close(&self);
}
