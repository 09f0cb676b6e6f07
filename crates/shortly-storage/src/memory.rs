use crate::index::UrlIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use shortly_core::error::Result;
use shortly_core::{ShortCode, Storage, UrlCodePair, UrlLookup, UserId, UserUrl};
use std::collections::HashMap;
use tracing::{debug, trace};

/// In-memory implementation of the [`Storage`] trait.
///
/// Both indices live behind a single `RwLock` so that a mutation always
/// updates them together. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    index: RwLock<UrlIndex>,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn init(&self) -> Result<()> {
        trace!("in-memory storage ready");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_code(&self, url: &str) -> Result<Option<ShortCode>> {
        Ok(self.index.read().code(url))
    }

    async fn get_code_batch(&self, urls: &[String]) -> Result<HashMap<String, ShortCode>> {
        Ok(self.index.read().codes(urls))
    }

    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlLookup>> {
        Ok(self.index.read().lookup(code))
    }

    async fn get_max_user_id(&self) -> Result<UserId> {
        Ok(self.index.read().max_user_id())
    }

    async fn get_user_urls(&self, user_id: UserId) -> Result<Vec<UserUrl>> {
        Ok(self.index.read().user_urls(user_id))
    }

    async fn insert(&self, user_id: UserId, url: &str, code: &ShortCode) -> Result<()> {
        if !self.index.write().insert(user_id, url, code) {
            debug!(url, "url already shortened, insert skipped");
        }
        Ok(())
    }

    async fn insert_batch(&self, user_id: UserId, batch: &[UrlCodePair]) -> Result<()> {
        self.index.write().insert_batch(user_id, batch)
    }

    async fn delete_batch(&self, user_id: UserId, codes: &[ShortCode]) -> Result<u64> {
        Ok(self.index.write().mark_deleted(user_id, codes))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.index.read().len() as u64)
    }

    async fn truncate(&self) -> Result<()> {
        self.index.write().clear();
        Ok(())
    }

    async fn close(&self) {}
}
