//! Configuration management for Gatehouse.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use gate_common::constants::{
    DEFAULT_ADMIN_SESSION_TTL_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_LOGIN_SESSION_IDLE_SECS,
    DEFAULT_REDIS_URL, ERROR_CLEAR_DELAY_MS, LOCKOUT_DURATION_MS, MAX_ATTEMPTS,
    SESSION_SWEEP_INTERVAL_SECS,
};

use crate::captcha::WidgetLayout;
use crate::gate::LockoutPolicy;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL (connected only when a Redis backend is selected)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Drag challenge configuration
    #[serde(default)]
    pub widget: WidgetConfig,

    /// Failed-login lockout configuration
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// Admin authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Login session bookkeeping
    #[serde(default)]
    pub sessions: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetConfig {
    /// Delay before the miss styling is cleared, in milliseconds
    #[serde(default = "default_error_clear_ms")]
    pub error_clear_ms: u64,

    /// Layout used when the host does not send its own geometry
    #[serde(default)]
    pub layout: WidgetLayout,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            error_clear_ms: default_error_clear_ms(),
            layout: WidgetLayout::default(),
        }
    }
}

impl WidgetConfig {
    pub fn error_clear_delay(&self) -> Duration {
        Duration::from_millis(self.error_clear_ms)
    }
}

/// Where login attempt records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptPersistence {
    /// Lives and dies with the login session
    #[default]
    Session,
    /// Survives reloads for the lifetime of the process
    Memory,
    /// Survives reloads and restarts
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// Failed logins before the lockout window is installed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lockout window in milliseconds
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_ms: i64,

    #[serde(default)]
    pub persistence: AttemptPersistence,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            lockout_duration_ms: default_lockout_duration(),
            persistence: AttemptPersistence::default(),
        }
    }
}

impl LockoutConfig {
    pub fn policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.max_attempts,
            lockout_duration_ms: self.lockout_duration_ms,
        }
    }

    /// Persisted records outlive the lockout window by an hour
    pub fn record_ttl_secs(&self) -> u64 {
        (self.lockout_duration_ms.max(0) as u64 / 1000) + 3600
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    /// Accounts listed under `[auth.admins]`
    #[default]
    Static,
    /// Accounts stored in Redis under `admin:{username}`
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub backend: AuthBackend,

    /// Admin session token validity in seconds
    #[serde(default = "default_admin_session_ttl")]
    pub session_ttl_secs: u64,

    /// Static accounts: username -> Argon2 PHC string
    #[serde(default)]
    pub admins: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: AuthBackend::default(),
            session_ttl_secs: default_admin_session_ttl(),
            admins: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle login sessions are evicted after this many seconds
    #[serde(default = "default_session_idle")]
    pub idle_ttl_secs: u64,

    /// How often the sweeper runs (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_session_idle(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_error_clear_ms() -> u64 { ERROR_CLEAR_DELAY_MS }
fn default_max_attempts() -> u32 { MAX_ATTEMPTS }
fn default_lockout_duration() -> i64 { LOCKOUT_DURATION_MS } // 5 minutes
fn default_admin_session_ttl() -> u64 { DEFAULT_ADMIN_SESSION_TTL_SECS } // 8 hours
fn default_session_idle() -> u64 { DEFAULT_LOGIN_SESSION_IDLE_SECS } // 15 minutes
fn default_sweep_interval() -> u64 { SESSION_SWEEP_INTERVAL_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = Self::from_sources(config_path, Self::environment())?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// `GATEHOUSE__<SECTION>__<KEY>` overrides, e.g. `GATEHOUSE__LOCKOUT__MAX_ATTEMPTS`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("GATEHOUSE").separator("__")
    }

    /// Defaults, then the config file if present, then the environment
    fn from_sources(config_path: &str, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        builder
            .add_source(env)
            .build()
            .context("Failed to load config file")?
            .try_deserialize()
            .context("Failed to parse config")
    }

    pub fn validate(&self) -> Result<()> {
        if self.lockout.max_attempts == 0 {
            bail!("lockout.max_attempts must be at least 1");
        }
        if self.lockout.lockout_duration_ms <= 0 {
            bail!("lockout.lockout_duration_ms must be positive");
        }
        if self.sessions.sweep_interval_secs == 0 {
            bail!("sessions.sweep_interval_secs must be positive");
        }
        let layout = &self.widget.layout;
        if layout.token.width > layout.track.width {
            bail!("widget.layout token is wider than its track");
        }
        Ok(())
    }

    /// True when any configured backend needs a Redis connection
    pub fn needs_redis(&self) -> bool {
        self.auth.backend == AuthBackend::Redis
            || self.lockout.persistence == AttemptPersistence::Redis
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            widget: WidgetConfig::default(),
            lockout: LockoutConfig::default(),
            auth: AuthConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_gate_constants() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.needs_redis());
        assert_eq!(config.lockout.policy(), LockoutPolicy::default());
        assert_eq!(config.widget.error_clear_delay(), Duration::from_secs(1));
        assert_eq!(config.lockout.record_ttl_secs(), 3900);
    }

    #[test]
    fn test_parse_toml() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                listen_addr = "0.0.0.0:9000"

                [lockout]
                max_attempts = 3
                persistence = "redis"

                [auth]
                backend = "static"

                [auth.admins]
                curator = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.lockout.max_attempts, 3);
        assert_eq!(config.lockout.lockout_duration_ms, 300_000);
        assert_eq!(config.lockout.persistence, AttemptPersistence::Redis);
        assert!(config.needs_redis());
        assert!(config.auth.admins["curator"].starts_with("$argon2id$"));
    }

    #[test]
    fn test_environment_applies_without_config_file() {
        let env = AppConfig::environment().source(Some(
            [
                ("GATEHOUSE__LOCKOUT__MAX_ATTEMPTS", "3"),
                ("GATEHOUSE__SESSIONS__IDLE_TTL_SECS", "60"),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        ));
        let config = AppConfig::from_sources("does/not/exist.toml", env).unwrap();

        assert_eq!(config.lockout.max_attempts, 3);
        assert_eq!(config.sessions.idle_ttl_secs, 60);
        assert_eq!(config.lockout.lockout_duration_ms, 300_000);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.lockout.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
