use clap::{Parser, Subcommand, ValueEnum};
use shortly_core::{BatchUrl, UserId};
use shortly_shortener::{ShortenerConfig, StorageOptions};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "BASE_URL";
pub const LOGGER_LEVEL_ENV: &str = "LOGGER_LEVEL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const FLUSH_EVERY_ENV: &str = "SHORTLY_FLUSH_EVERY";
pub const OP_TIMEOUT_ENV: &str = "SHORTLY_OP_TIMEOUT_SECS";
pub const JWT_SECRET_ENV: &str = "SHORTLY_JWT_SECRET";

pub const DEFAULT_LOGGER_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "shortly", about = "Operate a shortly url store")]
pub struct Cli {
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = shortly_shortener::config::DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(short = 'l', long, env = LOGGER_LEVEL_ENV, default_value = DEFAULT_LOGGER_LEVEL)]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<String>,

    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    #[arg(long, env = FLUSH_EVERY_ENV, default_value_t = shortly_storage::file::DEFAULT_FLUSH_EVERY)]
    pub flush_every: usize,

    /// Deadline for every storage call, in seconds.
    #[arg(long, env = OP_TIMEOUT_ENV, default_value_t = 5)]
    pub op_timeout_secs: u64,

    #[arg(long, env = JWT_SECRET_ENV, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one url.
    Encode {
        #[arg(short, long, default_value_t = 1)]
        user: UserId,
        url: String,
    },
    /// Shorten many urls given as `correlation_id=url`.
    Batch {
        #[arg(short, long, default_value_t = 1)]
        user: UserId,
        #[arg(required = true, value_parser = parse_batch_url)]
        entries: Vec<BatchUrl>,
    },
    /// Resolve a short code.
    Decode { code: String },
    /// List the urls owned by a user.
    List {
        #[arg(short, long, default_value_t = 1)]
        user: UserId,
    },
    /// Mark codes owned by a user as deleted.
    Delete {
        #[arg(short, long, default_value_t = 1)]
        user: UserId,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Allocate a user id and print a session token for it.
    Token,
    /// Print the number of stored mappings.
    Count,
    /// Remove every mapping.
    Truncate,
}

fn parse_batch_url(entry: &str) -> Result<BatchUrl, String> {
    match entry.split_once('=') {
        Some((id, url)) if !id.is_empty() && !url.is_empty() => Ok(BatchUrl {
            correlation_id: id.to_string(),
            original_url: url.to_string(),
        }),
        _ => Err(format!("expected correlation_id=url, got {entry:?}")),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Cli {
    pub fn config(&self) -> ShortenerConfig {
        let storage = StorageOptions {
            database_dsn: non_empty(&self.database_dsn).map(str::to_string),
            file_path: non_empty(&self.file_storage_path).map(PathBuf::from),
            flush_every: self.flush_every,
            ..StorageOptions::default()
        };

        ShortenerConfig {
            base_url: self.base_url.clone(),
            storage,
            op_timeout: Duration::from_secs(self.op_timeout_secs),
            jwt_secret: non_empty(&self.jwt_secret).map(str::to_string),
            ..ShortenerConfig::default()
        }
    }
}
