use crate::auth::JwtCredentials;
use crate::chunk::{chunk_urls, correlate};
use crate::config::ShortenerConfig;
use crate::deadline::with_deadline;
use crate::factory::open_storage;
use crate::user_id::UserIdAllocator;
use async_trait::async_trait;
use shortly_core::{
    BatchResult, BatchUrl, Encoded, ShortCode, Shortener, ShortenerError, Storage, UrlCodePair,
    UserId, UserUrl,
};
use shortly_generator::{Generator, RandomGenerator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Owner ids start at 1; 0 and below are never stored.
fn ensure_owner(user_id: UserId) -> Result<()> {
    if user_id < 1 {
        return Err(ShortenerError::InvalidAuthorization);
    }
    Ok(())
}

/// The shortener service: code generation, lookups and batches on top of a
/// [`Storage`] backend.
///
/// Encode, decode, batch encode and the background delete all serialize on
/// one lock per service. Unrelated URLs therefore wait on each other; the
/// service favours a simple read-then-write critical section over
/// throughput.
///
/// Note: generated codes are not checked against stored ones. A collision
/// re-points the existing code to the new URL.
pub struct ShortenerService<S: ?Sized, G> {
    storage: Arc<S>,
    generator: G,
    users: UserIdAllocator,
    credentials: JwtCredentials,
    lock: Arc<Mutex<()>>,
    base_url: String,
    op_timeout: Duration,
    parallelism: usize,
}

impl ShortenerService<dyn Storage, RandomGenerator> {
    /// Opens the backend chosen by `config.storage` and builds a service on
    /// top of it.
    pub async fn from_config(config: &ShortenerConfig) -> Result<Self> {
        config.validate()?;
        let (backend, storage) = open_storage(&config.storage, config.op_timeout).await;
        debug!(%backend, "storage opened");
        Self::new(
            storage,
            RandomGenerator::with_length(config.code_length),
            config,
        )
        .await
    }
}

impl<S: Storage + ?Sized, G: Generator> ShortenerService<S, G> {
    /// Creates a service over an already initialized storage.
    ///
    /// The user id allocator is seeded from the storage here, once.
    pub async fn new(storage: Arc<S>, generator: G, config: &ShortenerConfig) -> Result<Self> {
        config.validate()?;
        let users = with_deadline(
            config.op_timeout,
            "get_max_user_id",
            UserIdAllocator::from_storage(storage.as_ref()),
        )
        .await?;
        info!(last_user_id = users.last_id(), "user id allocator seeded");

        Ok(Self {
            storage,
            generator,
            users,
            credentials: JwtCredentials::from_secret(
                config.jwt_secret.as_deref(),
                config.token_ttl,
            ),
            lock: Arc::new(Mutex::new(())),
            base_url: config.base_url.clone(),
            op_timeout: config.op_timeout,
            parallelism: config.parallelism,
        })
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn generate_user_id(&self) -> UserId {
        self.users.next_id()
    }

    /// Stores a mapping with a caller-chosen code.
    pub async fn add_shortly(&self, user_id: UserId, url: &str, code: &ShortCode) -> Result<()> {
        ensure_owner(user_id)?;
        let _guard = self.lock.lock().await;
        with_deadline(self.op_timeout, "insert", self.storage.insert(user_id, url, code)).await?;
        Ok(())
    }

    /// Removes every mapping.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        with_deadline(self.op_timeout, "truncate", self.storage.truncate()).await?;
        info!("storage truncated");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(with_deadline(self.op_timeout, "count", self.storage.count()).await?)
    }

    /// Flushes and releases the storage.
    pub async fn close(&self) {
        let _guard = self.lock.lock().await;
        self.storage.close().await;
    }

    /// Spawns the soft delete of `codes` owned by `user_id`.
    ///
    /// The handle only exists for callers that want to wait; the request
    /// path drops it. Failures are logged by the task itself.
    pub fn schedule_delete(&self, user_id: UserId, codes: Vec<String>) -> JoinHandle<()> {
        if ensure_owner(user_id).is_err() {
            warn!(user_id, "delete requested without a valid owner, ignored");
            return tokio::spawn(async {});
        }

        let storage = Arc::clone(&self.storage);
        let lock = Arc::clone(&self.lock);
        let timeout = self.op_timeout;
        let codes: Vec<ShortCode> = codes
            .into_iter()
            .filter_map(|code| match ShortCode::new(code.as_str()) {
                Ok(code) => Some(code),
                Err(err) => {
                    warn!(user_id, code = %code, error = %err, "malformed short code skipped");
                    None
                }
            })
            .collect();
        info!(user_id, count = codes.len(), "mark short urls as deleted");

        tokio::spawn(async move {
            let _guard = lock.lock().await;
            match with_deadline(timeout, "delete_batch", storage.delete_batch(user_id, &codes))
                .await
            {
                Ok(marked) => info!(
                    user_id,
                    requested = codes.len(),
                    marked,
                    "short urls marked as deleted"
                ),
                Err(err) => error!(user_id, error = %err, "failed to mark short urls as deleted"),
            }
        })
    }

    fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    fn generate_code(&self) -> ShortCode {
        self.generator.generate().into()
    }
}

#[async_trait]
impl<S: Storage + ?Sized, G: Generator> Shortener for ShortenerService<S, G> {
    fn auth(&self, token: &str) -> Result<UserId> {
        self.credentials.user_id(token)
    }

    fn create_token(&self) -> Result<(UserId, String)> {
        let user_id = self.generate_user_id();
        let token = self.credentials.issue(user_id)?;
        Ok((user_id, token))
    }

    async fn encode_url(&self, user_id: UserId, url: &str) -> Result<Encoded> {
        ensure_owner(user_id)?;
        let _guard = self.lock.lock().await;

        let existing = with_deadline(self.op_timeout, "get_code", self.storage.get_code(url)).await?;
        if let Some(code) = existing {
            return Ok(Encoded {
                short_url: self.short_url(&code),
                conflict: true,
            });
        }

        let code = self.generate_code();
        with_deadline(self.op_timeout, "insert", self.storage.insert(user_id, url, &code)).await?;
        debug!(user_id, url, code = %code, "url shortened");

        Ok(Encoded {
            short_url: self.short_url(&code),
            conflict: false,
        })
    }

    async fn batch_encode_url(&self, user_id: UserId, batch: Vec<BatchUrl>) -> Vec<BatchResult> {
        if ensure_owner(user_id).is_err() {
            warn!(user_id, size = batch.len(), "batch without a valid owner rejected");
            return Vec::new();
        }
        let _guard = self.lock.lock().await;

        let (correlations, urls) = correlate(batch);
        let correlation_id = |url: &str| correlations.get(url).cloned().unwrap_or_default();
        let mut results = Vec::with_capacity(urls.len());

        for (index, chunk) in chunk_urls(&urls, self.parallelism).into_iter().enumerate() {
            let existing = match with_deadline(
                self.op_timeout,
                "get_code_batch",
                self.storage.get_code_batch(chunk),
            )
            .await
            {
                Ok(existing) => existing,
                Err(err) => {
                    warn!(chunk = index, size = chunk.len(), error = %err, "lookup failed, chunk skipped");
                    continue;
                }
            };

            results.extend(chunk.iter().filter_map(|url| {
                existing.get(url).map(|code| BatchResult {
                    correlation_id: correlation_id(url),
                    short_url: self.short_url(code),
                })
            }));

            let pairs: Vec<UrlCodePair> = chunk
                .iter()
                .filter(|url| !existing.contains_key(*url))
                .map(|url| UrlCodePair::new(url.clone(), self.generate_code()))
                .collect();
            if pairs.is_empty() {
                continue;
            }

            if let Err(err) = with_deadline(
                self.op_timeout,
                "insert_batch",
                self.storage.insert_batch(user_id, &pairs),
            )
            .await
            {
                warn!(chunk = index, size = pairs.len(), error = %err, "insert failed, chunk skipped");
                continue;
            }

            results.extend(pairs.iter().map(|pair| BatchResult {
                correlation_id: correlation_id(&pair.url),
                short_url: self.short_url(&pair.code),
            }));
        }

        debug!(user_id, shortened = results.len(), "batch encoded");
        results
    }

    async fn decode_url(&self, code: &str) -> Result<String> {
        let code = ShortCode::new(code).map_err(|_| ShortenerError::NotFound(code.to_string()))?;
        let _guard = self.lock.lock().await;

        match with_deadline(self.op_timeout, "get_url", self.storage.get_url(&code)).await? {
            None => Err(ShortenerError::NotFound(code.to_string())),
            Some(lookup) if lookup.is_deleted => Err(ShortenerError::Gone(code.to_string())),
            Some(lookup) => Ok(lookup.url),
        }
    }

    async fn get_user_urls(&self, user_id: UserId) -> Vec<UserUrl> {
        match with_deadline(
            self.op_timeout,
            "get_user_urls",
            self.storage.get_user_urls(user_id),
        )
        .await
        {
            Ok(urls) => urls,
            Err(err) => {
                error!(user_id, error = %err, "failed to list user urls");
                Vec::new()
            }
        }
    }

    fn delete_user_urls(&self, user_id: UserId, codes: Vec<String>) {
        drop(self.schedule_delete(user_id, codes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortly_core::error::Result as StorageResult;
    use shortly_core::{StorageError, UrlLookup};
    use shortly_generator::random::ALPHABET;
    use shortly_storage::MemoryStorage;
    use std::collections::{HashMap, HashSet};

    const BASE: &str = "http://localhost:8080";

    fn config(parallelism: usize) -> ShortenerConfig {
        ShortenerConfig::builder()
            .base_url(BASE)
            .parallelism(parallelism)
            .jwt_secret("test-secret")
            .build()
    }

    async fn service_over<S: Storage>(
        storage: S,
        parallelism: usize,
    ) -> ShortenerService<S, RandomGenerator> {
        ShortenerService::new(Arc::new(storage), RandomGenerator::new(), &config(parallelism))
            .await
            .unwrap()
    }

    async fn test_service() -> ShortenerService<MemoryStorage, RandomGenerator> {
        service_over(MemoryStorage::new(), 4).await
    }

    fn code_of(short_url: &str) -> &str {
        short_url.strip_prefix(BASE).unwrap().trim_start_matches('/')
    }

    fn batch(urls: &[&str]) -> Vec<BatchUrl> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| BatchUrl {
                correlation_id: format!("c{i}"),
                original_url: url.to_string(),
            })
            .collect()
    }

    /// Always hands out the same code.
    struct FixedGenerator(&'static str);

    impl Generator for FixedGenerator {
        type Output = ShortCode;

        fn generate(&self) -> ShortCode {
            ShortCode::new_unchecked(self.0)
        }
    }

    /// Delegates to a memory storage but can fail batches or stall lookups.
    #[derive(Default)]
    struct FaultyStorage {
        inner: MemoryStorage,
        fail_batches_with: Option<&'static str>,
        stall_lookups: bool,
    }

    #[async_trait]
    impl Storage for FaultyStorage {
        async fn init(&self) -> StorageResult<()> {
            self.inner.init().await
        }
        async fn ping(&self) -> StorageResult<()> {
            self.inner.ping().await
        }
        async fn get_code(&self, url: &str) -> StorageResult<Option<ShortCode>> {
            self.inner.get_code(url).await
        }
        async fn get_code_batch(&self, urls: &[String]) -> StorageResult<HashMap<String, ShortCode>> {
            self.inner.get_code_batch(urls).await
        }
        async fn get_url(&self, code: &ShortCode) -> StorageResult<Option<UrlLookup>> {
            if self.stall_lookups {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.inner.get_url(code).await
        }
        async fn get_max_user_id(&self) -> StorageResult<UserId> {
            self.inner.get_max_user_id().await
        }
        async fn get_user_urls(&self, user_id: UserId) -> StorageResult<Vec<UserUrl>> {
            self.inner.get_user_urls(user_id).await
        }
        async fn insert(&self, user_id: UserId, url: &str, code: &ShortCode) -> StorageResult<()> {
            self.inner.insert(user_id, url, code).await
        }
        async fn insert_batch(&self, user_id: UserId, batch: &[UrlCodePair]) -> StorageResult<()> {
            if let Some(marker) = self.fail_batches_with {
                if batch.iter().any(|pair| pair.url.contains(marker)) {
                    return Err(StorageError::Transaction(format!("refusing {marker}")));
                }
            }
            self.inner.insert_batch(user_id, batch).await
        }
        async fn delete_batch(&self, user_id: UserId, codes: &[ShortCode]) -> StorageResult<u64> {
            self.inner.delete_batch(user_id, codes).await
        }
        async fn count(&self) -> StorageResult<u64> {
            self.inner.count().await
        }
        async fn truncate(&self) -> StorageResult<()> {
            self.inner.truncate().await
        }
        async fn close(&self) {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn encode_generates_code_of_configured_shape() {
        let service = test_service().await;

        for url in ["http://ya.ru", "http://yandex.ru"] {
            let encoded = service.encode_url(1, url).await.unwrap();
            let code = code_of(&encoded.short_url);

            assert!(!encoded.conflict);
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn encode_twice_returns_same_code_with_conflict() {
        let service = test_service().await;

        let first = service.encode_url(1, "http://ya.ru").await.unwrap();
        let second = service.encode_url(2, "http://ya.ru").await.unwrap();

        assert!(!first.conflict);
        assert!(second.conflict);
        assert_eq!(first.short_url, second.short_url);
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn encode_returns_preloaded_codes() {
        let service = test_service().await;
        service
            .add_shortly(1, "http://ya.ru", &ShortCode::new("dHGfdhj4").unwrap())
            .await
            .unwrap();

        let encoded = service.encode_url(1, "http://ya.ru").await.unwrap();

        assert_eq!(encoded.short_url, format!("{BASE}/dHGfdhj4"));
        assert!(encoded.conflict);
    }

    #[tokio::test]
    async fn decode_round_trips_encoded_urls() {
        let service = test_service().await;
        let urls = ["http://ya.ru", "https://example.com/a/b?c=d", "http://yandex.ru"];

        for url in urls {
            let encoded = service.encode_url(1, url).await.unwrap();
            let decoded = service.decode_url(code_of(&encoded.short_url)).await.unwrap();
            assert_eq!(decoded, url);
        }
    }

    #[tokio::test]
    async fn decode_known_and_unknown_codes() {
        let service = test_service().await;
        service.clear().await.unwrap();
        assert_eq!(service.count().await.unwrap(), 0);

        service
            .add_shortly(1, "http://ya.ru", &ShortCode::new("dHGfdhj4").unwrap())
            .await
            .unwrap();
        service
            .add_shortly(1, "http://yandex.ru", &ShortCode::new("78gsshSd").unwrap())
            .await
            .unwrap();
        assert_eq!(service.count().await.unwrap(), 2);

        assert_eq!(service.decode_url("dHGfdhj4").await.unwrap(), "http://ya.ru");
        assert_eq!(service.decode_url("78gsshSd").await.unwrap(), "http://yandex.ru");
        assert_eq!(service.decode_url("dHGfdhj4").await.unwrap(), "http://ya.ru");
        assert!(matches!(
            service.decode_url("unknown1").await.unwrap_err(),
            ShortenerError::NotFound(_)
        ));
        assert!(matches!(
            service.decode_url("7nnDfdds").await.unwrap_err(),
            ShortenerError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn malformed_code_is_not_found() {
        let service = test_service().await;

        let err = service.decode_url("../etc").await.unwrap_err();

        assert!(matches!(err, ShortenerError::NotFound(code) if code == "../etc"));
    }

    #[tokio::test]
    async fn deleted_codes_are_gone_for_owner_only() {
        let service = test_service().await;
        let mine = service.encode_url(1, "http://mine.example").await.unwrap();
        let theirs = service.encode_url(2, "http://theirs.example").await.unwrap();
        let mine = code_of(&mine.short_url).to_string();
        let theirs = code_of(&theirs.short_url).to_string();

        service
            .schedule_delete(1, vec![mine.clone(), theirs.clone()])
            .await
            .unwrap();

        assert!(matches!(
            service.decode_url(&mine).await.unwrap_err(),
            ShortenerError::Gone(_)
        ));
        assert_eq!(service.decode_url(&theirs).await.unwrap(), "http://theirs.example");
        // soft delete keeps the record
        assert_eq!(service.count().await.unwrap(), 2);
        assert_eq!(service.get_user_urls(1).await.len(), 1);
    }

    #[tokio::test]
    async fn delete_user_urls_returns_before_the_delete_lands() {
        let service = test_service().await;
        let encoded = service.encode_url(1, "http://ya.ru").await.unwrap();
        let code = code_of(&encoded.short_url).to_string();

        service.delete_user_urls(1, vec![code.clone()]);

        let service = &service;
        let code = code.as_str();
        awaitility::at_most(Duration::from_secs(5))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async move {
                matches!(service.decode_url(code).await, Err(ShortenerError::Gone(_)))
            })
            .await;
    }

    #[tokio::test]
    async fn batch_of_new_urls_is_complete() {
        let service = test_service().await;
        let urls: Vec<String> = (0..10).map(|i| format!("http://{i}.example")).collect();
        let request = batch(&urls.iter().map(String::as_str).collect::<Vec<_>>());

        let results = service.batch_encode_url(1, request).await;

        assert_eq!(results.len(), 10);
        let ids: HashSet<_> = results.iter().map(|r| r.correlation_id.clone()).collect();
        let expected: HashSet<_> = (0..10).map(|i| format!("c{i}")).collect();
        assert_eq!(ids, expected);
        for result in &results {
            let code = code_of(&result.short_url);
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
        assert_eq!(service.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn batch_reuses_existing_codes_first() {
        let service = service_over(MemoryStorage::new(), 1).await;
        service
            .add_shortly(1, "http://ya.ru", &ShortCode::new("dHGfdhj4").unwrap())
            .await
            .unwrap();

        let results = service
            .batch_encode_url(1, batch(&["http://new.example", "http://ya.ru"]))
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].correlation_id, "c1");
        assert_eq!(results[0].short_url, format!("{BASE}/dHGfdhj4"));
        assert_eq!(results[1].correlation_id, "c0");
        assert_eq!(
            service.decode_url(code_of(&results[1].short_url)).await.unwrap(),
            "http://new.example"
        );
    }

    #[tokio::test]
    async fn batch_collapses_repeated_urls() {
        let service = test_service().await;
        let request = vec![
            BatchUrl {
                correlation_id: "first".into(),
                original_url: "http://ya.ru".into(),
            },
            BatchUrl {
                correlation_id: "second".into(),
                original_url: "http://ya.ru".into(),
            },
        ];

        let results = service.batch_encode_url(1, request).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].correlation_id, "second");
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_chunk_is_skipped_and_others_kept() {
        let storage = FaultyStorage {
            fail_batches_with: Some("broken"),
            ..Default::default()
        };
        let service = service_over(storage, 2).await;

        let results = service
            .batch_encode_url(
                1,
                batch(&["http://ok1.example", "http://ok2.example", "http://broken.example", "http://ok3.example"]),
            )
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.correlation_id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c1"]);
        assert_eq!(service.count().await.unwrap(), 2);
        assert!(service
            .storage()
            .get_code("http://broken.example")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn stalled_storage_times_out() {
        let storage = FaultyStorage {
            stall_lookups: true,
            ..Default::default()
        };
        let config = ShortenerConfig::builder()
            .op_timeout(Duration::from_millis(20))
            .build();
        let service = ShortenerService::new(Arc::new(storage), RandomGenerator::new(), &config)
            .await
            .unwrap();

        let err = service.decode_url("dHGfdhj4").await.unwrap_err();

        assert!(matches!(err, ShortenerError::Timeout(_)));
    }

    #[tokio::test]
    async fn clear_resets_count() {
        let service = test_service().await;
        service.encode_url(1, "http://a.example").await.unwrap();
        service.encode_url(1, "http://b.example").await.unwrap();
        assert_eq!(service.count().await.unwrap(), 2);

        service.clear().await.unwrap();

        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn user_ids_continue_after_stored_owners() {
        let storage = MemoryStorage::new();
        for (user, url, code) in [
            (1, "http://a.example", "aaaaaaaa"),
            (1, "http://b.example", "bbbbbbbb"),
            (3, "http://c.example", "cccccccc"),
        ] {
            storage
                .insert(user, url, &ShortCode::new_unchecked(code))
                .await
                .unwrap();
        }
        let service = service_over(storage, 4).await;

        assert_eq!(service.generate_user_id(), 4);
        let (user_id, token) = service.create_token().unwrap();
        assert_eq!(user_id, 5);
        assert_eq!(service.auth(&token).unwrap(), 5);
    }

    #[tokio::test]
    async fn sentinel_owners_are_never_stored() {
        let service = test_service().await;

        for user_id in [0, -1] {
            assert!(matches!(
                service.encode_url(user_id, "http://zero.example").await.unwrap_err(),
                ShortenerError::InvalidAuthorization
            ));
            assert!(matches!(
                service
                    .add_shortly(user_id, "http://zero.example", &ShortCode::new_unchecked("zerozero"))
                    .await
                    .unwrap_err(),
                ShortenerError::InvalidAuthorization
            ));
            let results = service
                .batch_encode_url(user_id, batch(&["http://a.example", "http://b.example"]))
                .await;
            assert!(results.is_empty());
            assert!(service.get_user_urls(user_id).await.is_empty());
        }

        assert_eq!(service.count().await.unwrap(), 0);
        assert_eq!(service.generate_user_id(), 1);
    }

    #[tokio::test]
    async fn delete_without_owner_changes_nothing() {
        let service = test_service().await;
        let encoded = service.encode_url(1, "http://ya.ru").await.unwrap();
        let code = code_of(&encoded.short_url).to_string();

        service.schedule_delete(0, vec![code.clone()]).await.unwrap();

        assert_eq!(service.decode_url(&code).await.unwrap(), "http://ya.ru");
    }

    #[tokio::test]
    async fn malformed_codes_do_not_block_the_rest_of_a_delete() {
        let service = test_service().await;
        let encoded = service.encode_url(1, "http://ya.ru").await.unwrap();
        let code = code_of(&encoded.short_url).to_string();

        service
            .schedule_delete(1, vec!["../etc".to_string(), String::new(), code.clone()])
            .await
            .unwrap();

        assert!(matches!(
            service.decode_url(&code).await.unwrap_err(),
            ShortenerError::Gone(_)
        ));
    }

    #[tokio::test]
    async fn out_of_range_code_length_is_rejected() {
        let config = ShortenerConfig::builder().code_length(40).build();
        let err = ShortenerService::new(
            Arc::new(MemoryStorage::new()),
            RandomGenerator::with_length(40),
            &config,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ShortenerError::InvalidShortCode(_)));

        let config = ShortenerConfig::builder().code_length(0).build();
        let err = ShortenerService::from_config(&config).await.err().unwrap();
        assert!(matches!(err, ShortenerError::InvalidShortCode(_)));
    }

    #[tokio::test]
    async fn longest_allowed_codes_round_trip() {
        let config = ShortenerConfig::builder()
            .base_url(BASE)
            .code_length(shortly_core::shortcode::MAX_LENGTH)
            .build();
        let service = ShortenerService::from_config(&config).await.unwrap();

        let encoded = service.encode_url(1, "http://ya.ru").await.unwrap();
        let code = code_of(&encoded.short_url);

        assert_eq!(code.len(), shortly_core::shortcode::MAX_LENGTH);
        assert_eq!(service.decode_url(code).await.unwrap(), "http://ya.ru");
    }

    #[tokio::test]
    async fn auth_rejects_foreign_tokens() {
        let service = test_service().await;

        assert!(matches!(
            service.auth("garbage").unwrap_err(),
            ShortenerError::NeedAuthorization
        ));
    }

    #[tokio::test]
    async fn code_collision_overwrites_previous_mapping() {
        // Known weak invariant: nothing checks a generated code against the
        // stored ones, so a repeated code silently re-points to the new URL.
        let service = ShortenerService::new(
            Arc::new(MemoryStorage::new()),
            FixedGenerator("sameCode"),
            &config(4),
        )
        .await
        .unwrap();

        let first = service.encode_url(1, "http://first.example").await.unwrap();
        let second = service.encode_url(1, "http://second.example").await.unwrap();

        assert_eq!(first.short_url, second.short_url);
        assert!(!second.conflict);
        assert_eq!(service.decode_url("sameCode").await.unwrap(), "http://second.example");
        assert_eq!(service.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_encodes_of_one_url_agree() {
        let service = Arc::new(test_service().await);
        let handles: Vec<_> = (0..16)
            .map(|user| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.encode_url(user + 1, "http://ya.ru").await.unwrap() })
            })
            .collect();

        let mut short_urls = HashSet::new();
        let mut created = 0;
        for handle in handles {
            let encoded = handle.await.unwrap();
            if !encoded.conflict {
                created += 1;
            }
            short_urls.insert(encoded.short_url);
        }

        assert_eq!(created, 1);
        assert_eq!(short_urls.len(), 1);
    }
}
