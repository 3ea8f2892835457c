//! # storefront-auth: Credential Manager
//!
//! Registers users with salted Argon2id keys, authenticates them in
//! constant time and issues HS256 session tokens.
//!
//! ```rust,ignore
//! use storefront_auth::{AuthConfig, CredentialManager, Registration};
//!
//! let auth = CredentialManager::new(db.clone(), AuthConfig::from_env()?);
//! let session = auth.register_session(Registration { .. }).await?;
//! let principal = auth.principal(&session.token)?;
//! ```

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::{AuthConfig, ConfigError, KdfParams};
pub use error::{AuthError, AuthResult};
pub use password::{derive_key, derive_key_blocking, generate_salt, DerivedKey};
pub use service::{CredentialManager, Registration, Session};
pub use token::{extract_bearer_token, Claims, TokenManager};
