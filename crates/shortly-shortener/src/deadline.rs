use shortly_core::error::{Result, StorageError};
use std::future::Future;
use std::time::Duration;

/// Runs a storage call under a deadline.
///
/// When the deadline passes the future is dropped, which aborts any
/// in-flight database round-trip, and `StorageError::Timeout` is returned.
pub async fn with_deadline<T, F>(timeout: Duration, operation: &'static str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(format!(
            "{operation} did not finish within {timeout:?}"
        ))),
    }
}
