//! Shared constants for Gatehouse components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default Gatehouse HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Failed logins before the lockout window is installed
pub const MAX_ATTEMPTS: u32 = 5;

/// Lockout window in milliseconds (5 minutes)
pub const LOCKOUT_DURATION_MS: i64 = 300_000;

/// Delay before the miss styling is cleared (1 second)
pub const ERROR_CLEAR_DELAY_MS: u64 = 1_000;

/// Distance of an edge-anchored target slot from its container edge, in pixels
pub const SLOT_EDGE_DISTANCE: f64 = 20.0;

/// Admin session token validity (8 hours)
pub const DEFAULT_ADMIN_SESSION_TTL_SECS: u64 = 28_800;

/// Idle login sessions are evicted after this many seconds (15 minutes)
pub const DEFAULT_LOGIN_SESSION_IDLE_SECS: u64 = 900;

/// Session sweeper interval (seconds)
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 5;

/// Redis key prefixes
pub mod redis_keys {
    /// Admin account record: admin:{username}
    pub const ADMIN_PREFIX: &str = "admin:";

    /// Issued admin session: admin_session:{token}
    pub const ADMIN_SESSION_PREFIX: &str = "admin_session:";

    /// Persisted login attempt record: attempts:{client_key}
    pub const ATTEMPTS_PREFIX: &str = "attempts:";
}

/// HTTP header names
pub mod headers {
    /// Stable client identifier used to key persisted attempt records
    pub const X_CLIENT_ID: &str = "X-Client-Id";
}
