//! The credential manager: registration, authentication and sessions.

use serde::{Deserialize, Serialize};
use storefront_core::validation::{validate_password, validate_username};
use storefront_core::{Principal, User, UserProfile, ValidationError, MIN_PASSWORD_LENGTH};
use storefront_db::{Database, DbError, NewUser};
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, KdfParams};
use crate::error::{AuthError, AuthResult};
use crate::password::{derive_key_blocking, generate_salt};
use crate::token::{Claims, TokenManager};

/// A registration request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: UserProfile,
}

/// A signed-in user and their session token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Registers and authenticates users against the `users` table.
#[derive(Debug)]
pub struct CredentialManager {
    db: Database,
    tokens: TokenManager,
    kdf: KdfParams,
}

impl CredentialManager {
    pub fn new(db: Database, config: AuthConfig) -> Self {
        CredentialManager {
            db,
            tokens: TokenManager::new(config.jwt_secret, config.token_lifetime_secs),
            kdf: config.kdf,
        }
    }

    /// Creates a user with a freshly salted derived key.
    ///
    /// ## Returns
    /// * `Err(AuthError::Validation)` - username empty or malformed
    /// * `Err(AuthError::UsernameConflict)` - username taken
    /// * `Err(AuthError::WeakPassword)` - password too short
    /// * `Err(AuthError::HashingFailure)` - key derivation failed
    pub async fn register(&self, registration: Registration) -> AuthResult<User> {
        let Registration {
            username,
            password,
            profile,
        } = registration;

        validate_username(&username)?;

        let users = self.db.users();
        if users.username_exists(&username).await? {
            return Err(AuthError::UsernameConflict(username));
        }

        validate_password(&password).map_err(|_| AuthError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        })?;

        let salt = generate_salt();
        let key = derive_key_blocking(&password, &salt, self.kdf).await?;

        let user = users
            .insert(NewUser {
                username: username.clone(),
                password_hash: key.to_base64(),
                salt: salt.to_vec(),
                profile,
                is_admin: false,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration.
                DbError::UniqueViolation { .. } => AuthError::UsernameConflict(username),
                other => other.into(),
            })?;

        info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Checks a username and password against the stored key.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        if username.is_empty() {
            return Err(ValidationError::required("username").into());
        }
        if password.is_empty() {
            return Err(ValidationError::required("password").into());
        }

        let Some(stored) = self.db.users().get_credentials(username).await? else {
            warn!(username, "Login for unknown user");
            return Err(AuthError::UserNotFound(username.to_string()));
        };

        let key = derive_key_blocking(password, &stored.salt, self.kdf).await?;
        if !key.matches_base64(&stored.password_hash)? {
            warn!(user_id = stored.user.id, "Login with wrong password");
            return Err(AuthError::BadCredentials);
        }

        if !stored.user.active {
            warn!(user_id = stored.user.id, "Login for deactivated account");
            return Err(AuthError::AccountInactive(stored.user.username));
        }

        debug!(user_id = stored.user.id, "Authenticated");
        Ok(stored.user)
    }

    /// Signs a session token for `user`.
    pub fn issue_token(&self, user: &User) -> AuthResult<String> {
        self.tokens.issue(user)
    }

    /// Verifies a session token and returns its claims.
    pub fn verify_token(&self, token: &str) -> AuthResult<Claims> {
        self.tokens.verify(token)
    }

    /// The caller a session token speaks for.
    pub fn principal(&self, token: &str) -> AuthResult<Principal> {
        self.verify_token(token)?.principal()
    }

    /// Authenticates and issues a token.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Session> {
        let user = self.authenticate(username, password).await?;
        let token = self.issue_token(&user)?;
        Ok(Session { user, token })
    }

    /// Registers and issues a token.
    pub async fn register_session(&self, registration: Registration) -> AuthResult<Session> {
        let user = self.register(registration).await?;
        let token = self.issue_token(&user)?;
        Ok(Session { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ErrorKind;
    use storefront_db::DbConfig;

    const FAST: KdfParams = KdfParams {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };

    async fn setup() -> CredentialManager {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        CredentialManager::new(db, AuthConfig::new("test-secret").with_kdf(FAST))
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            profile: UserProfile::default(),
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let auth = setup().await;
        let alice = auth.register(registration("alice", "password123")).await.unwrap();

        let user = auth.authenticate("alice", "password123").await.unwrap();
        assert_eq!(user, alice);
    }

    #[tokio::test]
    async fn test_register_rejects_taken_username() {
        let auth = setup().await;
        auth.register(registration("alice", "password123")).await.unwrap();

        let err = auth
            .register(registration("alice", "another-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameConflict(ref name) if name == "alice"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let auth = setup().await;
        let err = auth.register(registration("alice", "12345")).await.unwrap_err();

        assert!(matches!(err, AuthError::WeakPassword { min: 6 }));
        assert!(auth.authenticate("alice", "12345").await.is_err());
    }

    #[tokio::test]
    async fn test_register_rejects_empty_username() {
        let auth = setup().await;
        let err = auth.register(registration("", "password123")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_authenticate_failures() {
        let auth = setup().await;
        auth.register(registration("alice", "password123")).await.unwrap();

        let err = auth.authenticate("bob", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound(_)));

        let err = auth.authenticate("alice", "password124").await.unwrap_err();
        assert!(matches!(err, AuthError::BadCredentials));
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let err = auth.authenticate("alice", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deactivated_account_cannot_log_in() {
        let auth = setup().await;
        let alice = auth.register(registration("alice", "password123")).await.unwrap();
        auth.db.users().deactivate(alice.id).await.unwrap();

        let err = auth.login("alice", "password123").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive(_)));
    }

    #[tokio::test]
    async fn test_sessions_carry_principal() {
        let auth = setup().await;
        let session = auth
            .register_session(registration("alice", "password123"))
            .await
            .unwrap();

        let principal = auth.principal(&session.token).unwrap();
        assert_eq!(principal.user_id, session.user.id);
        assert_eq!(principal.username, "alice");
        assert!(!principal.is_admin);

        let again = auth.login("alice", "password123").await.unwrap();
        assert_eq!(again.user, session.user);
        assert_ne!(again.token, session.token);
    }
}
