//! Admin accounts and issued sessions stored in Redis.

use async_trait::async_trait;
use gate_common::GateError;
use gate_common::constants::redis_keys::{ADMIN_PREFIX, ADMIN_SESSION_PREFIX};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use super::{AdminGrant, Authenticator, Credentials, LoginResponse, generate_session_token, verify_password};

/// Account record under `admin:{username}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAccount {
    /// Argon2 PHC string
    pub password: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Session record under `admin_session:{token}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    username: String,
    issued_at: i64,
    expires_at: i64,
}

/// Authenticator backed by Redis
pub struct RedisAuthenticator {
    redis: redis::aio::ConnectionManager,
    /// Admin session TTL in seconds
    session_ttl: u64,
}

impl RedisAuthenticator {
    pub fn new(redis: redis::aio::ConnectionManager, session_ttl: u64) -> Self {
        Self { redis, session_ttl }
    }

    async fn load_account(&self, username: &str) -> Result<Option<AdminAccount>, GateError> {
        let mut conn = self.redis.clone();
        let key = format!("{}{}", ADMIN_PREFIX, username);
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| GateError::Redis(e.to_string()))?;

        raw.map(|data| {
            serde_json::from_str(&data)
                .map_err(|e| GateError::Internal(format!("corrupt admin record {}: {}", key, e)))
        })
        .transpose()
    }

    async fn issue_session(&self, username: &str) -> Result<AdminGrant, GateError> {
        let token = generate_session_token();
        let now = chrono::Utc::now().timestamp();
        let expires_at = now + self.session_ttl as i64;

        let stored = StoredSession {
            username: username.to_string(),
            issued_at: now,
            expires_at,
        };
        let value =
            serde_json::to_string(&stored).map_err(|e| GateError::Internal(e.to_string()))?;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(
            format!("{}{}", ADMIN_SESSION_PREFIX, token),
            value,
            self.session_ttl,
        )
        .await
        .map_err(|e| GateError::Redis(e.to_string()))?;

        Ok(AdminGrant {
            username: username.to_string(),
            token,
            expires_at,
        })
    }
}

#[async_trait]
impl Authenticator for RedisAuthenticator {
    async fn attempt_login(&self, credentials: &Credentials) -> Result<LoginResponse, GateError> {
        let account = self.load_account(&credentials.username).await?;

        let accepted = match account {
            Some(account) if account.disabled => {
                tracing::info!(username = %credentials.username, "Login attempt on disabled admin account");
                false
            }
            Some(account) => verify_password(&account.password, &credentials.password),
            None => false,
        };

        if !accepted {
            tracing::debug!(username = %credentials.username, "Admin login rejected");
            return Ok(LoginResponse::rejected("Invalid username or password"));
        }

        let grant = self.issue_session(&credentials.username).await?;
        tracing::info!(username = %credentials.username, "Admin session issued");

        Ok(LoginResponse::granted(grant))
    }
}
