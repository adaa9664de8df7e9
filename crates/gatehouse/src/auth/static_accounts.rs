//! Admin accounts declared in the configuration file.

use std::collections::HashMap;

use async_trait::async_trait;
use gate_common::GateError;

use super::{AdminGrant, Authenticator, Credentials, LoginResponse, generate_session_token, verify_password};

/// Authenticates against `username -> Argon2 PHC string` pairs from config
pub struct StaticAuthenticator {
    accounts: HashMap<String, String>,
    session_ttl: u64,
}

impl StaticAuthenticator {
    pub fn new(accounts: HashMap<String, String>, session_ttl: u64) -> Self {
        if accounts.is_empty() {
            tracing::warn!("No admin accounts configured; every login will be rejected");
        }
        Self {
            accounts,
            session_ttl,
        }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn attempt_login(&self, credentials: &Credentials) -> Result<LoginResponse, GateError> {
        let accepted = self
            .accounts
            .get(&credentials.username)
            .is_some_and(|stored| verify_password(stored, &credentials.password));

        if !accepted {
            tracing::debug!(username = %credentials.username, "Static login rejected");
            return Ok(LoginResponse::rejected("Invalid username or password"));
        }

        let now = chrono::Utc::now().timestamp();
        Ok(LoginResponse::granted(AdminGrant {
            username: credentials.username.clone(),
            token: generate_session_token(),
            expires_at: now + self.session_ttl as i64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::quick_hash;

    fn authenticator() -> StaticAuthenticator {
        let mut accounts = HashMap::new();
        accounts.insert(
            "curator".to_string(),
            quick_hash("relic-42"),
        );
        StaticAuthenticator::new(accounts, 3600)
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepts_known_account() {
        let response = authenticator()
            .attempt_login(&creds("curator", "relic-42"))
            .await
            .unwrap();
        assert!(response.success);
        let grant = response.data.unwrap();
        assert_eq!(grant.username, "curator");
        assert!(grant.expires_at > chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_rejects_wrong_password_and_unknown_user() {
        let auth = authenticator();
        let wrong = auth.attempt_login(&creds("curator", "relic-43")).await.unwrap();
        assert!(!wrong.success);
        assert!(wrong.data.is_none());

        let unknown = auth.attempt_login(&creds("visitor", "relic-42")).await.unwrap();
        assert!(!unknown.success);
    }
}
