//! Session token issuance and verification (HS256 JWT).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use storefront_core::{Principal, User};
use uuid::Uuid;

use crate::config::ConfigError;
use crate::error::{AuthError, AuthResult};

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Username at issue time
    pub username: String,

    /// Admin flag at issue time
    pub is_admin: bool,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

impl Claims {
    /// The authenticated caller these claims describe.
    pub fn principal(&self) -> AuthResult<Principal> {
        let user_id = self
            .sub
            .parse()
            .map_err(|_| AuthError::TokenInvalid(format!("subject '{}' is not a user id", self.sub)))?;

        Ok(Principal {
            user_id,
            username: self.username.clone(),
            is_admin: self.is_admin,
        })
    }
}

/// JWT token manager.
pub struct TokenManager {
    secret: String,
    lifetime_secs: i64,
}

impl TokenManager {
    /// Create a new token manager.
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        TokenManager {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Generate a session token for `user`.
    pub fn issue(&self, user: &User) -> AuthResult<String> {
        let now = Utc::now();
        let exp = expiry_after(now, self.lifetime_secs).ok_or_else(|| {
            ConfigError::InvalidValue(format!("token lifetime {}s", self.lifetime_secs))
        })?;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            is_admin: user.is_admin,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenInvalid(format!("failed to sign token: {e}")))
    }

    /// Validate and decode a token.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

/// `now + lifetime_secs`, or `None` when that is not a representable instant.
pub(crate) fn expiry_after(now: DateTime<Utc>, lifetime_secs: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_seconds(lifetime_secs)?)
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}
