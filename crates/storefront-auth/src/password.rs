//! # Password Key Derivation
//!
//! Salted Argon2id derivation and constant-time verification.
//!
//! ```text
//! password ─┐
//!           ├─► Argon2id (memory-hard, runs on the blocking pool) ─► 64-byte key
//! salt ─────┘        (16 random bytes per user)                     │
//!                                                                    ▼
//!                                                    stored as base64 text
//! ```
//!
//! Derivation never runs on the async executor threads:
//! [`derive_key_blocking`] moves it to `spawn_blocking`.

use argon2::password_hash::Output;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::KdfParams;
use crate::error::{AuthError, AuthResult};

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes.
pub const KEY_LEN: usize = 64;

/// Output of the key derivation function.
#[derive(Clone)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    /// Text form stored in the `password` column.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Compares against a stored base64 key in constant time.
    ///
    /// A stored value that is not valid base64 never matches.
    pub fn matches_base64(&self, stored: &str) -> AuthResult<bool> {
        let stored = match STANDARD.decode(stored.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        if stored.len() != KEY_LEN {
            return Ok(false);
        }

        // Constant-time equality (subtle).
        let expected = Output::new(&stored).map_err(|e| AuthError::HashingFailure(e.to_string()))?;
        let actual = Output::new(&self.0).map_err(|e| AuthError::HashingFailure(e.to_string()))?;

        Ok(expected == actual)
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Draws a fresh salt from the thread-local CSPRNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    rand::random()
}

/// Derives the key for `password` and `salt`. CPU and memory heavy.
pub fn derive_key(password: &[u8], salt: &[u8], params: KdfParams) -> AuthResult<DerivedKey> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )?;

    let mut key = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params).hash_password_into(
        password,
        salt,
        &mut key,
    )?;

    Ok(DerivedKey(key))
}

/// [`derive_key`] on the blocking worker pool.
pub async fn derive_key_blocking(
    password: &str,
    salt: &[u8],
    params: KdfParams,
) -> AuthResult<DerivedKey> {
    let password = password.as_bytes().to_vec();
    let salt = salt.to_vec();

    tokio::task::spawn_blocking(move || derive_key(&password, &salt, params))
        .await
        .map_err(|e| AuthError::HashingFailure(format!("derivation task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_key(b"password123", &salt, FAST).unwrap();
        let b = derive_key(b"password123", &salt, FAST).unwrap();

        assert!(a.matches_base64(&b.to_base64()).unwrap());
        assert_eq!(STANDARD.decode(a.to_base64()).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_salt_changes_key() {
        let a = derive_key(b"password123", &[1u8; SALT_LEN], FAST).unwrap();
        let b = derive_key(b"password123", &[2u8; SALT_LEN], FAST).unwrap();

        assert!(!a.matches_base64(&b.to_base64()).unwrap());
    }

    #[test]
    fn test_stored_key_is_not_plaintext() {
        let key = derive_key(b"password123", &generate_salt(), FAST).unwrap();
        assert!(!key.to_base64().contains("password123"));
    }

    #[test]
    fn test_garbage_stored_value_never_matches() {
        let key = derive_key(b"password123", &[3u8; SALT_LEN], FAST).unwrap();

        assert!(!key.matches_base64("not base64!").unwrap());
        assert!(!key.matches_base64(&STANDARD.encode([0u8; 12])).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[tokio::test]
    async fn test_blocking_derivation_matches_inline() {
        let salt = generate_salt();
        let inline = derive_key(b"password123", &salt, FAST).unwrap();
        let pooled = derive_key_blocking("password123", &salt, FAST).await.unwrap();

        assert!(inline.matches_base64(&pooled.to_base64()).unwrap());
    }

    #[test]
    fn test_bad_params_are_hashing_failures() {
        let bad = KdfParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        let err = derive_key(b"pw", &[0u8; SALT_LEN], bad).unwrap_err();
        assert!(matches!(err, AuthError::HashingFailure(_)));
    }
}
