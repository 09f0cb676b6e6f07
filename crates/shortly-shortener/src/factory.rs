use crate::deadline::with_deadline;
use shortly_core::error::Result;
use shortly_core::Storage;
use shortly_storage::file::DEFAULT_FLUSH_EVERY;
use shortly_storage::postgres::DEFAULT_MAX_CONNECTIONS;
use shortly_storage::{FileStorage, MemoryStorage, PostgresStorage};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

/// Where the storage backend should live.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageOptions {
    /// PostgreSQL DSN. Takes precedence over everything else.
    #[builder(default, setter(strip_option, into))]
    pub database_dsn: Option<String>,
    /// Path of the JSON snapshot file.
    #[builder(default, setter(strip_option, into))]
    pub file_path: Option<PathBuf>,
    #[builder(default = DEFAULT_FLUSH_EVERY)]
    pub flush_every: usize,
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The kind of backend that ended up serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Database,
    File,
    Memory,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Database => write!(f, "database"),
            BackendKind::File => write!(f, "file"),
            BackendKind::Memory => write!(f, "in-memory"),
        }
    }
}

/// Opens the highest-precedence backend that initializes and answers a ping.
///
/// Precedence is database, then file, then memory. A configured backend that
/// fails is logged and skipped; the in-memory backend always succeeds.
pub async fn open_storage(
    options: &StorageOptions,
    timeout: Duration,
) -> (BackendKind, Arc<dyn Storage>) {
    if let Some(dsn) = options.database_dsn.as_deref().filter(|dsn| !dsn.is_empty()) {
        match open_database(dsn, options.max_connections, timeout).await {
            Ok(storage) => {
                info!("using database url storage");
                return (BackendKind::Database, Arc::new(storage));
            }
            Err(err) => warn!(error = %err, "database storage unavailable, falling back"),
        }
    }

    if let Some(path) = options.file_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        let storage = FileStorage::with_flush_every(path, options.flush_every);
        match validate(&storage, timeout).await {
            Ok(()) => {
                info!(path = %path.display(), "using file url storage");
                return (BackendKind::File, Arc::new(storage));
            }
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "file storage unavailable, falling back"
            ),
        }
    }

    info!("using in-memory url storage");
    (BackendKind::Memory, Arc::new(MemoryStorage::new()))
}

async fn open_database(
    dsn: &str,
    max_connections: u32,
    timeout: Duration,
) -> Result<PostgresStorage> {
    let storage = PostgresStorage::connect_lazy(dsn, max_connections, timeout)?;
    if let Err(err) = validate(&storage, timeout).await {
        storage.close().await;
        return Err(err);
    }
    Ok(storage)
}

async fn validate<S: Storage>(storage: &S, timeout: Duration) -> Result<()> {
    with_deadline(timeout, "init", storage.init()).await?;
    with_deadline(timeout, "ping", storage.ping()).await
}
