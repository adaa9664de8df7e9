//! Login sessions: one drag challenge paired with one attempt gate.
//!
//! The pair is wired with two watch channels (`verified` upward, `reset`
//! downward) and kept behind a per-session mutex. The mutex is never held
//! across the backend call; while the call is outstanding only a `Weak`
//! handle is kept, so a session torn down mid-request is never written to.

mod registry;

pub use registry::{SessionRegistry, SessionSettings, SessionStatsSnapshot, SubmitReport, session_sweeper};

use std::sync::Arc;
use std::time::Duration;

use gate_common::LoginAttemptRecord;
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::captcha::{DragOutcome, PointerInput, VerificationWidget, WidgetLayout, WidgetView};
use crate::gate::{AttemptGate, GateView, LockoutPolicy};

/// Wall clock in Unix epoch milliseconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(gate_common::now_millis)
}

pub type SharedSession = Arc<Mutex<LoginSession>>;

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub widget: WidgetView,
    pub gate: GateView,
}

pub struct LoginSession {
    id: String,
    /// Key for persisted attempt records
    client_key: String,
    widget: VerificationWidget,
    gate: AttemptGate,
    last_active_ms: i64,
}

impl LoginSession {
    pub fn new(
        id: String,
        client_key: String,
        layout: WidgetLayout,
        error_clear_delay: Duration,
        policy: LockoutPolicy,
        record: LoginAttemptRecord,
        now_ms: i64,
    ) -> Self {
        let (verified_tx, verified_rx) = watch::channel(false);
        let (reset_tx, reset_rx) = watch::channel(false);

        Self {
            id,
            client_key,
            widget: VerificationWidget::new(layout, error_clear_delay, verified_tx, reset_rx),
            gate: AttemptGate::new(policy, verified_rx, reset_tx).with_record(record),
            last_active_ms: now_ms,
        }
    }

    fn touch(&mut self, now_ms: i64) {
        self.last_active_ms = now_ms;
    }

    fn idle_for(&self, now_ms: i64) -> i64 {
        now_ms - self.last_active_ms
    }

    pub fn pointer(&mut self, input: PointerInput, now_ms: i64) -> DragOutcome {
        self.touch(now_ms);
        self.widget.handle(input)
    }

    pub fn snapshot(&self, now_ms: i64) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            widget: self.widget.view(),
            gate: self.gate.view(now_ms),
        }
    }
}
