//! Credential manager configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. The signing secret has no default.

use std::env;
use std::str::FromStr;

use chrono::Utc;
use storefront_core::DEFAULT_TOKEN_LIFETIME_SECS;

use crate::token::expiry_after;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Credential manager configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,

    /// Session token lifetime in seconds (default: one week)
    pub token_lifetime_secs: i64,

    /// Key derivation cost
    pub kdf: KdfParams,
}

impl AuthConfig {
    /// Creates a configuration with default lifetime and KDF cost.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        AuthConfig {
            jwt_secret: jwt_secret.into(),
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
            kdf: KdfParams::default(),
        }
    }

    /// Overrides the key derivation cost.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Overrides the token lifetime.
    pub fn with_token_lifetime_secs(mut self, secs: i64) -> Self {
        self.token_lifetime_secs = secs;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `STOREFRONT_JWT_SECRET` is required. `STOREFRONT_TOKEN_LIFETIME_SECS`,
    /// `STOREFRONT_KDF_MEMORY_KIB`, `STOREFRONT_KDF_ITERATIONS` and
    /// `STOREFRONT_KDF_PARALLELISM` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("STOREFRONT_JWT_SECRET")
            .map_err(|_| ConfigError::MissingRequired("STOREFRONT_JWT_SECRET".to_string()))?;

        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue("STOREFRONT_JWT_SECRET".to_string()));
        }

        let defaults = KdfParams::default();
        let config = AuthConfig {
            jwt_secret,
            token_lifetime_secs: env_or("STOREFRONT_TOKEN_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME_SECS)?,
            kdf: KdfParams {
                memory_kib: env_or("STOREFRONT_KDF_MEMORY_KIB", defaults.memory_kib)?,
                iterations: env_or("STOREFRONT_KDF_ITERATIONS", defaults.iterations)?,
                parallelism: env_or("STOREFRONT_KDF_PARALLELISM", defaults.parallelism)?,
            },
        };

        check_token_lifetime(config.token_lifetime_secs)?;

        // Reject cost parameters Argon2 itself would refuse.
        argon2::Params::new(
            config.kdf.memory_kib,
            config.kdf.iterations,
            config.kdf.parallelism,
            None,
        )
        .map_err(|_| ConfigError::InvalidValue("STOREFRONT_KDF_*".to_string()))?;

        Ok(config)
    }
}

/// A lifetime must be positive and land on a representable expiry.
fn check_token_lifetime(secs: i64) -> Result<(), ConfigError> {
    if secs <= 0 || expiry_after(Utc::now(), secs).is_none() {
        return Err(ConfigError::InvalidValue(
            "STOREFRONT_TOKEN_LIFETIME_SECS".to_string(),
        ));
    }

    Ok(())
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new("secret");
        assert_eq!(config.token_lifetime_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.kdf, KdfParams::default());
    }

    #[test]
    fn test_token_lifetime_bounds() {
        assert!(check_token_lifetime(DEFAULT_TOKEN_LIFETIME_SECS).is_ok());
        assert!(check_token_lifetime(0).is_err());
        assert!(check_token_lifetime(-60).is_err());
        assert!(matches!(
            check_token_lifetime(i64::MAX),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(check_token_lifetime(i64::MAX / 1000 - 1).is_err());
    }

    #[test]
    fn test_builders() {
        let kdf = KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        };
        let config = AuthConfig::new("secret")
            .with_kdf(kdf)
            .with_token_lifetime_secs(60);

        assert_eq!(config.kdf, kdf);
        assert_eq!(config.token_lifetime_secs, 60);
    }
}
