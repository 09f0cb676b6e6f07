use crate::index::{Entry, UrlIndex};
use async_trait::async_trait;
use shortly_core::error::{Result, StorageError};
use shortly_core::{ShortCode, Storage, UrlCodePair, UrlLookup, UserId, UserUrl};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Default number of new records between two snapshot rewrites.
pub const DEFAULT_FLUSH_EVERY: usize = 10;

#[derive(Debug, Default)]
struct FileState {
    index: UrlIndex,
    /// Record count at which the next snapshot rewrite is due.
    flush_at: usize,
}

/// File-backed implementation of the [`Storage`] trait.
///
/// Records are held in memory and the whole set is periodically rewritten to
/// a JSON file shaped as
/// `{"<url>": {"code": "...", "user_id": 1, "is_deleted": false}}`.
/// A rewrite happens every `flush_every` new records and once more on
/// [`Storage::close`]; records inserted since the last rewrite are lost if
/// the process dies without closing the storage.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    flush_every: usize,
    state: RwLock<FileState>,
}

impl FileStorage {
    /// Creates a storage bound to `path`. Nothing is read until [`Storage::init`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_flush_every(path, DEFAULT_FLUSH_EVERY)
    }

    /// Creates a storage that rewrites its snapshot every `flush_every` records.
    pub fn with_flush_every(path: impl Into<PathBuf>, flush_every: usize) -> Self {
        let flush_every = flush_every.max(1);
        Self {
            path: path.into(),
            flush_every,
            state: RwLock::new(FileState {
                index: UrlIndex::default(),
                flush_at: flush_every,
            }),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, Entry>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.create_empty().await?;
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(StorageError::Unavailable(err.to_string())),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::InvalidData(format!("{}: {e}", self.path.display()))
        })
    }

    async fn create_empty(&self) -> Result<()> {
        tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await
            .map(drop)
            .map_err(|e| StorageError::Unavailable(format!("{}: {e}", self.path.display())))
    }

    /// Rewrites the snapshot. The caller holds the write lock for the whole
    /// rewrite so snapshots never land out of order.
    async fn flush(&self, state: &FileState) -> Result<()> {
        let data = serde_json::to_vec(state.index.entries())
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            records = state.index.len(),
            "snapshot written"
        );
        Ok(())
    }

    async fn flush_if_due(&self, state: &mut FileState) {
        let count = state.index.len();
        if count < state.flush_at {
            return;
        }
        while state.flush_at <= count {
            state.flush_at += self.flush_every;
        }
        if let Err(err) = self.flush(state).await {
            error!(path = %self.path.display(), error = %err, "failed to write snapshot");
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn init(&self) -> Result<()> {
        let entries = self.load().await?;
        let mut state = self.state.write().await;
        state.index = UrlIndex::from_entries(entries);
        state.flush_at = state.index.len() + self.flush_every;
        info!(
            path = %self.path.display(),
            records = state.index.len(),
            "file storage loaded"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => self.create_empty().await,
            Err(err) => Err(StorageError::Unavailable(err.to_string())),
        }
    }

    async fn get_code(&self, url: &str) -> Result<Option<ShortCode>> {
        Ok(self.state.read().await.index.code(url))
    }

    async fn get_code_batch(&self, urls: &[String]) -> Result<HashMap<String, ShortCode>> {
        Ok(self.state.read().await.index.codes(urls))
    }

    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlLookup>> {
        Ok(self.state.read().await.index.lookup(code))
    }

    async fn get_max_user_id(&self) -> Result<UserId> {
        Ok(self.state.read().await.index.max_user_id())
    }

    async fn get_user_urls(&self, user_id: UserId) -> Result<Vec<UserUrl>> {
        Ok(self.state.read().await.index.user_urls(user_id))
    }

    async fn insert(&self, user_id: UserId, url: &str, code: &ShortCode) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.index.insert(user_id, url, code) {
            debug!(url, "url already shortened, insert skipped");
            return Ok(());
        }
        self.flush_if_due(&mut state).await;
        Ok(())
    }

    async fn insert_batch(&self, user_id: UserId, batch: &[UrlCodePair]) -> Result<()> {
        let mut state = self.state.write().await;
        state.index.insert_batch(user_id, batch)?;
        self.flush_if_due(&mut state).await;
        Ok(())
    }

    async fn delete_batch(&self, user_id: UserId, codes: &[ShortCode]) -> Result<u64> {
        Ok(self.state.write().await.index.mark_deleted(user_id, codes))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.index.len() as u64)
    }

    async fn truncate(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.index.clear();
        state.flush_at = self.flush_every;
        self.flush(&state).await
    }

    async fn close(&self) {
        let state = self.state.write().await;
        match self.flush(&state).await {
            Ok(()) => info!(path = %self.path.display(), "file storage closed"),
            Err(err) => error!(path = %self.path.display(), error = %err, "final snapshot failed"),
        }
    }
}
