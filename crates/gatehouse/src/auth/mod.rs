//! Admin authentication backends.
//!
//! The attempt gate only needs a single request/response exchange with a
//! binary outcome; everything behind it lives here.

mod redis_store;
mod static_accounts;

pub use redis_store::RedisAuthenticator;
pub use static_accounts::StaticAuthenticator;

use async_trait::async_trait;
use gate_common::GateError;
use serde::{Deserialize, Serialize};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Username/password pair submitted by the login form
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Issued on a successful admin login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminGrant {
    pub username: String,
    pub token: String,
    /// Expiry (Unix epoch seconds)
    pub expires_at: i64,
}

/// Backend answer to a login attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AdminGrant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    pub fn granted(grant: AdminGrant) -> Self {
        Self {
            success: true,
            data: Some(grant),
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(reason.into()),
        }
    }
}

/// The `attemptLogin(username, password)` collaborator
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn attempt_login(&self, credentials: &Credentials) -> Result<LoginResponse, GateError>;
}

/// Hash a password into an Argon2id PHC string for `[auth.admins]` or `admin:{username}`
pub fn hash_password(password: &str) -> Result<String, GateError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GateError::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string.
///
/// The cost parameters are read from the stored hash.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(stored) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored admin password is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Minimum-cost Argon2id hash so tests stay fast
#[cfg(test)]
pub(crate) fn quick_hash(password: &str) -> String {
    use argon2::{Algorithm, Params, Version};

    let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string()
}

/// Generate a cryptographically secure admin session token
pub(crate) fn generate_session_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::rng(), &mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_salted_phc() {
        let a = hash_password("hunter2").unwrap();
        let b = hash_password("hunter2").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_password(&a, "hunter2"));
    }

    #[test]
    fn test_verify_password() {
        let stored = quick_hash("correct horse");
        assert!(verify_password(&stored, "correct horse"));
        assert!(!verify_password(&stored, "wrong horse"));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("pepper$0123abcd", "correct horse"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_session_tokens_are_unique() {
        let a = generate_session_token();
        let b = generate_session_token();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials {
            username: "curator".to_string(),
            password: "s3cret".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("curator"));
        assert!(!printed.contains("s3cret"));
    }
}
