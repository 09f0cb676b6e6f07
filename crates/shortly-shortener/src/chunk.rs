use shortly_core::BatchUrl;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Number of chunks a batch is split into at most.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Splits `urls` into `min(len, parallelism)` chunks of `ceil(len / n)`
/// URLs each; the last chunk may be shorter.
pub fn chunk_urls(urls: &[String], parallelism: usize) -> Vec<&[String]> {
    if urls.is_empty() {
        return Vec::new();
    }
    let chunks = urls.len().min(parallelism.max(1));
    let size = urls.len().div_ceil(chunks);
    urls.chunks(size).collect()
}

/// Maps every URL to its correlation id and lists the distinct URLs in the
/// order they first appear. A URL given twice keeps the last correlation id.
pub(crate) fn correlate(batch: Vec<BatchUrl>) -> (HashMap<String, String>, Vec<String>) {
    let mut correlations = HashMap::with_capacity(batch.len());
    let mut urls = Vec::with_capacity(batch.len());
    for entry in batch {
        if correlations
            .insert(entry.original_url.clone(), entry.correlation_id)
            .is_none()
        {
            urls.push(entry.original_url);
        }
    }
    (correlations, urls)
}
