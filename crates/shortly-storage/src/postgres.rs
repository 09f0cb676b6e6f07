use async_trait::async_trait;
use shortly_core::error::{Result, StorageError};
use shortly_core::{ShortCode, Storage, UrlCodePair, UrlLookup, UserId, UserUrl};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SCHEMA: &str = include_str!("../ddl/postgres/shortly.sql");

const INSERT_SQL: &str = r#"
    INSERT INTO urls.shortly (url, code, user_id)
    VALUES ($1, $2, $3)
"#;

/// Default size of the connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL implementation of the storage contract.
///
/// One table `urls.shortly` keyed by `(code, url)`, with `url` additionally
/// unique so a URL never gets a second live code. Soft delete flips
/// `is_deleted`; rows are only ever removed by [`Storage::truncate`].
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a storage from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a storage whose pool opens connections on first use.
    ///
    /// Only the DSN is validated here; reachability is checked by
    /// [`Storage::init`] and [`Storage::ping`].
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::Configuration(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn code_from_row(row: &sqlx::postgres::PgRow) -> Result<(ShortCode, String)> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    let url: String = row.try_get("url").map_err(map_sqlx_error)?;
    Ok((ShortCode::new_unchecked(code), url))
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("postgres schema ready");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)
    }

    async fn get_code(&self, url: &str) -> Result<Option<ShortCode>> {
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT code
            FROM urls.shortly
            WHERE url = $1
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(code.map(ShortCode::new_unchecked))
    }

    async fn get_code_batch(&self, urls: &[String]) -> Result<HashMap<String, ShortCode>> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT code, url
            FROM urls.shortly
            WHERE url = ANY($1)
            "#,
        )
        .bind(urls)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| code_from_row(row).map(|(code, url)| (url, code)))
            .collect()
    }

    async fn get_url(&self, code: &ShortCode) -> Result<Option<UrlLookup>> {
        let row = sqlx::query(
            r#"
            SELECT url, is_deleted
            FROM urls.shortly
            WHERE code = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UrlLookup {
            url: row.try_get("url").map_err(map_sqlx_error)?,
            is_deleted: row.try_get("is_deleted").map_err(map_sqlx_error)?,
        }))
    }

    async fn get_max_user_id(&self) -> Result<UserId> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(user_id), 0)::BIGINT AS max_user_id
            FROM urls.shortly
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn get_user_urls(&self, user_id: UserId) -> Result<Vec<UserUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT code, url
            FROM urls.shortly
            WHERE user_id = $1
            ORDER BY url
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| code_from_row(row).map(|(code, url)| UserUrl { code, url }))
            .collect()
    }

    async fn insert(&self, user_id: UserId, url: &str, code: &ShortCode) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO urls.shortly (url, code, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(url)
        .bind(code.as_str())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(url, "url already shortened, insert skipped");
        }
        Ok(())
    }

    async fn insert_batch(&self, user_id: UserId, batch: &[UrlCodePair]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // The same SQL text on one connection reuses a single prepared
        // statement for every pair.
        for pair in batch {
            let result = sqlx::query(INSERT_SQL)
                .bind(pair.url.as_str())
                .bind(pair.code.as_str())
                .bind(user_id)
                .execute(&mut *tx)
                .await;

            if let Err(err) = result {
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "failed to roll back batch insert");
                }
                warn!(url = %pair.url, error = %err, "batch insert aborted");
                return Err(StorageError::Transaction(err.to_string()));
            }
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn delete_batch(&self, user_id: UserId, codes: &[ShortCode]) -> Result<u64> {
        if codes.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE urls.shortly SET is_deleted = true WHERE user_id = ");
        builder.push_bind(user_id);
        builder.push(" AND code IN (");
        let mut separated = builder.separated(", ");
        for code in codes {
            separated.push_bind(code.as_str());
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM urls.shortly")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn truncate(&self) -> Result<()> {
        sqlx::query("TRUNCATE urls.shortly RESTART IDENTITY")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) {
        info!("closing postgres connection pool");
        self.pool.close().await;
    }
}
