use serde::{Deserialize, Serialize};
use shortly_core::error::{Result, StorageError};
use shortly_core::{ShortCode, UrlCodePair, UrlLookup, UserId, UserUrl};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What is stored for each original URL.
///
/// This is also the on-disk shape used by the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub code: ShortCode,
    pub user_id: UserId,
    #[serde(default)]
    pub is_deleted: bool,
}

/// The pair of indices shared by the memory and file backends.
///
/// `by_url` owns the records; `by_code` points back into it. A code that is
/// inserted twice for different URLs simply re-points `by_code`.
#[derive(Debug, Default)]
pub(crate) struct UrlIndex {
    by_url: BTreeMap<String, Entry>,
    by_code: HashMap<ShortCode, String>,
}

impl UrlIndex {
    pub fn from_entries(by_url: BTreeMap<String, Entry>) -> Self {
        let by_code = by_url
            .iter()
            .map(|(url, entry)| (entry.code.clone(), url.clone()))
            .collect();
        Self { by_url, by_code }
    }

    pub fn entries(&self) -> &BTreeMap<String, Entry> {
        &self.by_url
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn code(&self, url: &str) -> Option<ShortCode> {
        self.by_url.get(url).map(|entry| entry.code.clone())
    }

    pub fn codes(&self, urls: &[String]) -> HashMap<String, ShortCode> {
        urls.iter()
            .filter_map(|url| self.code(url).map(|code| (url.clone(), code)))
            .collect()
    }

    pub fn lookup(&self, code: &ShortCode) -> Option<UrlLookup> {
        let url = self.by_code.get(code)?;
        let entry = self.by_url.get(url)?;
        Some(UrlLookup {
            url: url.clone(),
            is_deleted: entry.is_deleted,
        })
    }

    pub fn max_user_id(&self) -> UserId {
        self.by_url
            .values()
            .map(|entry| entry.user_id)
            .max()
            .unwrap_or(0)
    }

    pub fn user_urls(&self, user_id: UserId) -> Vec<UserUrl> {
        self.by_url
            .iter()
            .filter(|(_, entry)| entry.user_id == user_id)
            .map(|(url, entry)| UserUrl {
                code: entry.code.clone(),
                url: url.clone(),
            })
            .collect()
    }

    /// Returns `false` without touching anything when `url` is already mapped.
    pub fn insert(&mut self, user_id: UserId, url: &str, code: &ShortCode) -> bool {
        if self.by_url.contains_key(url) {
            return false;
        }
        self.by_url.insert(
            url.to_owned(),
            Entry {
                code: code.clone(),
                user_id,
                is_deleted: false,
            },
        );
        self.by_code.insert(code.clone(), url.to_owned());
        true
    }

    /// Rejects the whole batch if any URL is already mapped or repeated.
    pub fn insert_batch(&mut self, user_id: UserId, batch: &[UrlCodePair]) -> Result<()> {
        let mut seen = HashSet::with_capacity(batch.len());
        for pair in batch {
            if self.by_url.contains_key(&pair.url) || !seen.insert(pair.url.as_str()) {
                return Err(StorageError::Conflict(pair.url.clone()));
            }
        }
        for pair in batch {
            self.insert(user_id, &pair.url, &pair.code);
        }
        Ok(())
    }

    pub fn mark_deleted(&mut self, user_id: UserId, codes: &[ShortCode]) -> u64 {
        let mut marked = 0;
        for code in codes {
            let Some(url) = self.by_code.get(code) else {
                continue;
            };
            if let Some(entry) = self.by_url.get_mut(url) {
                if entry.user_id == user_id && !entry.is_deleted {
                    entry.is_deleted = true;
                    marked += 1;
                }
            }
        }
        marked
    }

    pub fn clear(&mut self) {
        self.by_url.clear();
        self.by_code.clear();
    }
}
