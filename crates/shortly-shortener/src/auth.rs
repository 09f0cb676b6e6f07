use jiff::Timestamp;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shortly_core::{ShortenerError, UserId};
use std::time::Duration;
use tracing::{debug, warn};

/// How long an issued token stays valid.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    exp: i64,
    user_id: UserId,
}

/// Issues and validates the HS256 session tokens that carry a user id.
#[derive(Clone)]
pub struct JwtCredentials {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtCredentials {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Uses `secret` when it is set and non-empty, otherwise a random one.
    ///
    /// Tokens signed with a random secret stop validating after a restart.
    pub fn from_secret(secret: Option<&str>, ttl: Duration) -> Self {
        match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Self::new(secret, ttl),
            None => {
                warn!("JWT secret not configured, generating a random one");
                let secret: String = rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(32)
                    .map(char::from)
                    .collect();
                Self::new(&secret, ttl)
            }
        }
    }

    /// Signs a token for `user_id`.
    pub fn issue(&self, user_id: UserId) -> Result<String, ShortenerError> {
        let claims = Claims {
            exp: Timestamp::now().as_second() + self.ttl.as_secs() as i64,
            user_id,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ShortenerError::Token(e.to_string()))
    }

    /// Extracts the user id from `token`.
    ///
    /// A token that does not verify is `NeedAuthorization`; a valid token
    /// without a usable user id is `InvalidAuthorization`.
    pub fn user_id(&self, token: &str) -> Result<UserId, ShortenerError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                debug!(error = %e, "rejected token");
                ShortenerError::NeedAuthorization
            })?;

        if data.claims.user_id < 1 {
            return Err(ShortenerError::InvalidAuthorization);
        }
        debug!(user_id = data.claims.user_id, "authorized user");
        Ok(data.claims.user_id)
    }
}

impl std::fmt::Debug for JwtCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtCredentials")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
