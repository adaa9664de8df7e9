//! Optional persistence of login attempt records across page reloads.

use std::collections::HashMap;

use async_trait::async_trait;
use gate_common::constants::redis_keys::ATTEMPTS_PREFIX;
use gate_common::{GateError, LoginAttemptRecord};
use redis::AsyncCommands;
use tokio::sync::RwLock;

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn load(&self, client_key: &str) -> Result<Option<LoginAttemptRecord>, GateError>;
    async fn save(&self, client_key: &str, record: &LoginAttemptRecord) -> Result<(), GateError>;
}

/// Process-lifetime store
#[derive(Default)]
pub struct MemoryAttemptStore {
    records: RwLock<HashMap<String, LoginAttemptRecord>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn load(&self, client_key: &str) -> Result<Option<LoginAttemptRecord>, GateError> {
        Ok(self.records.read().await.get(client_key).copied())
    }

    async fn save(&self, client_key: &str, record: &LoginAttemptRecord) -> Result<(), GateError> {
        let mut records = self.records.write().await;
        if *record == LoginAttemptRecord::default() {
            records.remove(client_key);
        } else {
            records.insert(client_key.to_string(), *record);
        }
        Ok(())
    }
}

/// Redis-backed store: `attempts:{client_key}`
pub struct RedisAttemptStore {
    redis: redis::aio::ConnectionManager,
    /// Record TTL in seconds
    ttl: u64,
}

impl RedisAttemptStore {
    pub fn new(redis: redis::aio::ConnectionManager, ttl: u64) -> Self {
        Self { redis, ttl }
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn load(&self, client_key: &str) -> Result<Option<LoginAttemptRecord>, GateError> {
        let mut conn = self.redis.clone();
        let key = format!("{}{}", ATTEMPTS_PREFIX, client_key);
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| GateError::Redis(e.to_string()))?;

        match raw {
            Some(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|e| GateError::Internal(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(&self, client_key: &str, record: &LoginAttemptRecord) -> Result<(), GateError> {
        let mut conn = self.redis.clone();
        let key = format!("{}{}", ATTEMPTS_PREFIX, client_key);

        if *record == LoginAttemptRecord::default() {
            let _: () = conn
                .del(&key)
                .await
                .map_err(|e| GateError::Redis(e.to_string()))?;
            return Ok(());
        }

        let data = serde_json::to_string(record).map_err(|e| GateError::Internal(e.to_string()))?;
        conn.set_ex::<_, _, ()>(&key, data, self.ttl)
            .await
            .map_err(|e| GateError::Redis(e.to_string()))?;
        Ok(())
    }
}
