//! Common error types for Gatehouse components.

use thiserror::Error;

/// Common errors across Gatehouse components
#[derive(Debug, Error)]
pub enum GateError {
    /// Local rejection: the drag challenge has not been solved
    #[error("{0}")]
    VerificationRequired(String),

    /// Local rejection: the lockout window is still open
    #[error("{message}")]
    LockedOut {
        message: String,
        remaining_minutes: u64,
    },

    /// Remote rejection: the backend refused the credentials
    #[error("{message}")]
    AuthenticationFailed {
        message: String,
        /// Attempts left before lockout (0 once the lockout is installed)
        remaining_attempts: u32,
    },

    /// A login request is already outstanding for this gate
    #[error("A login request is already in progress")]
    Busy,

    /// The login session was torn down
    #[error("Login session closed: {0}")]
    SessionClosed(String),

    /// Redis connection/operation error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown login session
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::VerificationRequired(_) => 400,
            Self::LockedOut { .. } => 423,
            Self::AuthenticationFailed { .. } => 401,
            Self::Busy => 409,
            Self::SessionClosed(_) => 410,
            Self::Redis(_) => 503,
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal(_) => 500,
        }
    }

    /// Local validation failures never reach the authentication backend
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            Self::VerificationRequired(_) | Self::LockedOut { .. } | Self::Busy
        )
    }
}
