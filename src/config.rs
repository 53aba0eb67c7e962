//! Auth Configuration
//!
//! Signing secret, token lifetime and algorithm. Built once at startup and
//! handed to [`TokenCodec`](crate::auth::TokenCodec); never mutated afterwards.

use crate::auth::SigningAlgorithm;
use chrono::Duration;
use std::fmt;
use thiserror::Error;

/// Default token lifetime in milliseconds
pub const DEFAULT_TOKEN_TTL_MS: i64 = 70_000;

/// Longest accepted token lifetime (365 days) in milliseconds
pub const MAX_TOKEN_TTL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

pub const ENV_SECRET: &str = "JWT_SECRET";
pub const ENV_EXPIRATION_MS: &str = "JWT_EXPIRATION_MS";
pub const ENV_ALGORITHM: &str = "JWT_ALGORITHM";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    /// Token lifetime
    pub token_ttl: Duration,
    /// Signing algorithm (HS512 unless configured otherwise)
    pub algorithm: SigningAlgorithm,
}

impl AuthConfig {
    /// Config with the default TTL and algorithm
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: Duration::milliseconds(DEFAULT_TOKEN_TTL_MS),
            algorithm: SigningAlgorithm::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_SECRET)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(ENV_SECRET))?;

        let mut config = Self::new(secret);

        if let Some(raw) = lookup(ENV_EXPIRATION_MS) {
            let ms = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|ms| (1..=MAX_TOKEN_TTL_MS).contains(ms))
                .ok_or_else(|| ConfigError::Invalid {
                    key: ENV_EXPIRATION_MS,
                    value: raw.clone(),
                })?;
            config.token_ttl = Duration::milliseconds(ms);
        }

        if let Some(raw) = lookup(ENV_ALGORITHM) {
            config.algorithm = raw.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_ALGORITHM,
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn ttl(&self) -> Duration {
        self.token_ttl
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
