//! Attempt counting and time-windowed lockout around the admin login.
//!
//! Submission order:
//! 1. reject if a request is already outstanding
//! 2. reject locally while `now < lockout_expires_at`
//! 3. reject locally unless the drag challenge reports `verified`
//! 4. otherwise hand a [`PendingLogin`] to the caller, who performs the
//!    backend call and feeds the answer to [`AttemptGate::complete`]
//!
//! The lockout is a timestamp compared against the wall clock at
//! submission time; nothing counts down in the background.
//!
//! Dropping a [`PendingLogin`] without completing it (the request future
//! was cancelled) re-opens the gate and commits nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gate_common::{GateError, LoginAttemptRecord, ceil_minutes};
use serde::Serialize;
use tokio::sync::watch;

use super::policy::LockoutPolicy;
use crate::auth::{AdminGrant, LoginResponse};

/// Proof that [`AttemptGate::begin`] admitted a submission.
///
/// Holds the gate's in-flight flag and releases it on drop.
#[derive(Debug)]
#[must_use = "dropping a pending login abandons the submission"]
pub struct PendingLogin {
    in_flight: Arc<AtomicBool>,
}

impl Drop for PendingLogin {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Serializable gate state for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// True while a request is outstanding or the lockout window is open
    pub login_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_minutes_remaining: Option<u64>,
    pub failure_count: u32,
    pub pending: bool,
    pub authenticated: bool,
}

pub struct AttemptGate {
    policy: LockoutPolicy,
    record: LoginAttemptRecord,
    /// Last value seen on the widget's verified channel
    verified: bool,
    verified_rx: watch::Receiver<bool>,
    reset_tx: watch::Sender<bool>,
    in_flight: Arc<AtomicBool>,
    message: Option<String>,
    grant: Option<AdminGrant>,
}

impl AttemptGate {
    pub fn new(
        policy: LockoutPolicy,
        verified_rx: watch::Receiver<bool>,
        reset_tx: watch::Sender<bool>,
    ) -> Self {
        let verified = *verified_rx.borrow();
        Self {
            policy,
            record: LoginAttemptRecord::default(),
            verified,
            verified_rx,
            reset_tx,
            in_flight: Arc::new(AtomicBool::new(false)),
            message: None,
            grant: None,
        }
    }

    /// Start from a previously persisted record
    pub fn with_record(mut self, record: LoginAttemptRecord) -> Self {
        self.record = record;
        self
    }

    pub fn record(&self) -> LoginAttemptRecord {
        self.record
    }

    /// Fold in the client's persisted record (other sessions may have written it)
    pub fn merge_record(&mut self, stored: &LoginAttemptRecord) {
        self.record.merge(stored);
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn sync_verified(&mut self) {
        if self.verified_rx.has_changed().unwrap_or(false) {
            self.verified = *self.verified_rx.borrow_and_update();
        }
    }

    /// Admit a submission, or reject it without contacting the backend
    pub fn begin(&mut self, now_ms: i64) -> Result<PendingLogin, GateError> {
        if self.is_pending() {
            return Err(GateError::Busy);
        }

        if self.record.clear_expired(now_ms) {
            tracing::info!(
                failure_count = self.record.failure_count,
                "Login lockout expired"
            );
        }

        if let Some(remaining_ms) = self.record.remaining_lockout_ms(now_ms) {
            let remaining_minutes = ceil_minutes(remaining_ms);
            let message = self.policy.locked_message(remaining_minutes);
            self.message = Some(message.clone());
            tracing::debug!(remaining_minutes, "Login rejected: lockout active");
            return Err(GateError::LockedOut {
                message,
                remaining_minutes,
            });
        }

        self.sync_verified();
        if !self.verified {
            let message = self.policy.verification_message();
            self.message = Some(message.clone());
            return Err(GateError::VerificationRequired(message));
        }

        self.in_flight.store(true, Ordering::Release);
        self.message = None;
        Ok(PendingLogin {
            in_flight: self.in_flight.clone(),
        })
    }

    /// Apply the backend's answer to an admitted submission
    pub fn complete(
        &mut self,
        pending: PendingLogin,
        response: Result<LoginResponse, GateError>,
        now_ms: i64,
    ) -> Result<Option<AdminGrant>, GateError> {
        drop(pending);

        match response {
            Ok(response) if response.success => {
                self.record.record_success();
                self.message = None;
                self.grant = response.data.clone();
                tracing::info!(
                    username = ?response.data.as_ref().map(|grant| &grant.username),
                    "Admin login succeeded"
                );
                Ok(response.data)
            }
            Ok(response) => {
                tracing::debug!(reason = ?response.error, "Admin login rejected by backend");
                Err(self.register_failure(now_ms))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Auth backend failed; counting as a failed login");
                Err(self.register_failure(now_ms))
            }
        }
    }

    fn register_failure(&mut self, now_ms: i64) -> GateError {
        let remaining = self
            .policy
            .remaining_after_failure(self.record.failure_count);

        let message = if remaining > 0 {
            self.policy.remaining_message(remaining as u64)
        } else {
            self.record.lockout_expires_at = Some(now_ms + self.policy.lockout_duration_ms);
            tracing::warn!(
                failure_count = self.record.failure_count + 1,
                lockout_ms = self.policy.lockout_duration_ms,
                "Admin login locked out"
            );
            self.policy.lockout_message()
        };

        // Keeps climbing past the threshold; only the timestamp gates access
        self.record.failure_count = self.record.failure_count.saturating_add(1);

        // Re-arm the drag challenge
        self.verified = false;
        self.reset_tx.send_modify(|value| *value = !*value);

        self.message = Some(message.clone());
        GateError::AuthenticationFailed {
            message,
            remaining_attempts: remaining.max(0) as u32,
        }
    }

    pub fn view(&self, now_ms: i64) -> GateView {
        let lockout_minutes_remaining = self.record.remaining_lockout_ms(now_ms).map(ceil_minutes);
        // An installed but elapsed lockout means the last message was a lockout notice
        let lockout_elapsed =
            lockout_minutes_remaining.is_none() && self.record.lockout_expires_at.is_some();
        let message = if lockout_elapsed {
            None
        } else {
            self.message.clone()
        };
        let pending = self.is_pending();
        GateView {
            message,
            login_disabled: pending || lockout_minutes_remaining.is_some(),
            lockout_minutes_remaining,
            failure_count: self.record.failure_count,
            pending,
            authenticated: self.grant.is_some(),
        }
    }
}
