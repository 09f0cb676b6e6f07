use crate::auth::DEFAULT_TOKEN_TTL;
use crate::chunk::available_parallelism;
use crate::factory::StorageOptions;
use shortly_core::shortcode::{DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH};
use shortly_core::ShortenerError;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a [`ShortenerService`](crate::ShortenerService).
#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Prefix of every composed short URL.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Length of generated codes.
    #[builder(default = DEFAULT_LENGTH)]
    pub code_length: usize,
    #[builder(default)]
    pub storage: StorageOptions,
    /// Deadline applied to every storage call.
    #[builder(default = DEFAULT_OP_TIMEOUT)]
    pub op_timeout: Duration,
    /// HS256 secret for session tokens; a random one is used when unset.
    #[builder(default, setter(strip_option, into))]
    pub jwt_secret: Option<String>,
    #[builder(default = DEFAULT_TOKEN_TTL)]
    pub token_ttl: Duration,
    /// Upper bound on the number of chunks a batch is split into.
    #[builder(default = available_parallelism())]
    pub parallelism: usize,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ShortenerConfig {
    /// Rejects settings the service could not honour.
    ///
    /// Generated codes must themselves be valid short codes, otherwise they
    /// could be stored but never decoded.
    pub fn validate(&self) -> Result<(), ShortenerError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.code_length) {
            return Err(ShortenerError::InvalidShortCode(format!(
                "code length must be between {MIN_LENGTH} and {MAX_LENGTH}, got {}",
                self.code_length
            )));
        }
        Ok(())
    }
}
