//! Application state and shared resources.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{Authenticator, RedisAuthenticator, StaticAuthenticator};
use crate::config::{AppConfig, AttemptPersistence, AuthBackend};
use crate::gate::{AttemptStore, MemoryAttemptStore, RedisAttemptStore};
use crate::session::{SessionRegistry, SessionSettings, system_clock};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Redis connection manager (auto-reconnecting), when a Redis backend is in use
    pub redis: Option<ConnectionManager>,

    /// Live login sessions
    pub sessions: Arc<SessionRegistry>,

    /// Admin credential check
    pub authenticator: Arc<dyn Authenticator>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state, connecting to Redis if needed
    pub async fn new(config: AppConfig) -> Result<Self> {
        let redis = if config.needs_redis() {
            // Connect to Redis with connection manager (handles reconnection)
            let client = redis::Client::open(config.redis_url.as_str())
                .context("Failed to create Redis client")?;

            let manager = ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            tracing::info!(url = %config.redis_url, "Redis connected");
            Some(manager)
        } else {
            None
        };

        let session_ttl = config.auth.session_ttl_secs;
        let authenticator: Arc<dyn Authenticator> = match config.auth.backend {
            AuthBackend::Static => Arc::new(StaticAuthenticator::new(
                config.auth.admins.clone(),
                session_ttl,
            )),
            AuthBackend::Redis => Arc::new(RedisAuthenticator::new(
                redis.clone().context("Redis auth backend without a connection")?,
                session_ttl,
            )),
        };

        let store: Option<Arc<dyn AttemptStore>> = match config.lockout.persistence {
            AttemptPersistence::Session => None,
            AttemptPersistence::Memory => Some(Arc::new(MemoryAttemptStore::new())),
            AttemptPersistence::Redis => Some(Arc::new(RedisAttemptStore::new(
                redis.clone().context("Redis attempt store without a connection")?,
                config.lockout.record_ttl_secs(),
            ))),
        };

        let sessions = Arc::new(SessionRegistry::new(
            session_settings(&config),
            store,
            system_clock(),
        ));

        Ok(Self::from_parts(config, redis, authenticator, sessions))
    }

    pub fn from_parts(
        config: AppConfig,
        redis: Option<ConnectionManager>,
        authenticator: Arc<dyn Authenticator>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            config,
            redis,
            sessions,
            authenticator,
            started_at: Instant::now(),
        }
    }
}

pub fn session_settings(config: &AppConfig) -> SessionSettings {
    SessionSettings {
        layout: config.widget.layout,
        error_clear_delay: config.widget.error_clear_delay(),
        policy: config.lockout.policy(),
        idle_ttl: std::time::Duration::from_secs(config.sessions.idle_ttl_secs),
    }
}
