//! Session registry, submission driver, and idle-session sweeper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use gate_common::{GateError, LoginAttemptRecord};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use super::{Clock, LoginSession, SessionView, SharedSession};
use crate::auth::{AdminGrant, Authenticator, Credentials};
use crate::captcha::{DragOutcome, ErrorClear, PointerInput, WidgetLayout};
use crate::gate::{AttemptStore, LockoutPolicy};

/// Settings applied to every new login session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub layout: WidgetLayout,
    pub error_clear_delay: Duration,
    pub policy: LockoutPolicy,
    pub idle_ttl: Duration,
}

/// Outcome of a submission that reached the gate
#[derive(Debug)]
pub struct SubmitReport {
    pub result: Result<Option<AdminGrant>, GateError>,
    pub view: SessionView,
}

/// Runtime statistics
#[derive(Default)]
struct SessionStats {
    created: AtomicU64,
    evicted: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    logins_ok: AtomicU64,
    logins_failed: AtomicU64,
    lockouts: AtomicU64,
    local_rejections: AtomicU64,
}

/// Snapshot of session statistics
#[derive(Clone, Debug, Serialize)]
pub struct SessionStatsSnapshot {
    pub active_sessions: usize,
    pub created: u64,
    pub evicted: u64,
    pub hits: u64,
    pub misses: u64,
    pub logins_ok: u64,
    pub logins_failed: u64,
    pub lockouts: u64,
    pub local_rejections: u64,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    settings: SessionSettings,
    store: Option<Arc<dyn AttemptStore>>,
    clock: Clock,
    stats: SessionStats,
}

impl SessionRegistry {
    pub fn new(
        settings: SessionSettings,
        store: Option<Arc<dyn AttemptStore>>,
        clock: Clock,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            store,
            clock,
            stats: SessionStats::default(),
        }
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Create a session, restoring any persisted attempt record for `client_key`
    pub async fn create(
        &self,
        client_key: Option<String>,
        layout: Option<WidgetLayout>,
    ) -> Result<SessionView, GateError> {
        let id = generate_session_id();
        let client_key = client_key.unwrap_or_else(|| id.clone());

        let record = match &self.store {
            Some(store) => store.load(&client_key).await?.unwrap_or_default(),
            None => LoginAttemptRecord::default(),
        };

        let now = self.now();
        let session = LoginSession::new(
            id.clone(),
            client_key,
            layout.unwrap_or(self.settings.layout),
            self.settings.error_clear_delay,
            self.settings.policy,
            record,
            now,
        );
        let view = session.snapshot(now);

        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        self.stats.created.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = %id,
            failure_count = record.failure_count,
            "Login session created"
        );

        Ok(view)
    }

    pub async fn get(&self, id: &str) -> Result<SharedSession, GateError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GateError::NotFound(format!("login session {}", id)))
    }

    pub async fn view(&self, id: &str) -> Result<SessionView, GateError> {
        let session = self.get(id).await?;
        let guard = session.lock().await;
        Ok(guard.snapshot(self.now()))
    }

    /// Tear a session down. In-flight work for it is discarded.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "Login session removed");
        }
        removed
    }

    async fn is_registered(&self, id: &str, session: &SharedSession) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Forward one pointer event to the session's widget
    pub async fn pointer(&self, id: &str, input: PointerInput) -> Result<SessionView, GateError> {
        let session = self.get(id).await?;
        let now = self.now();
        let mut guard = session.lock().await;

        match guard.pointer(input, now) {
            DragOutcome::Hit => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
            }
            DragOutcome::Miss { clear, .. } => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                schedule_error_clear(Arc::downgrade(&session), clear);
            }
            _ => {}
        }

        Ok(guard.snapshot(now))
    }

    /// Run one login submission through the gate and the backend.
    ///
    /// Local rejections come back inside the report without touching the
    /// backend. `SessionClosed` means the session was torn down while the
    /// backend call was outstanding and nothing was committed.
    pub async fn submit(
        &self,
        id: &str,
        credentials: Credentials,
        authenticator: &dyn Authenticator,
    ) -> Result<SubmitReport, GateError> {
        let session = self.get(id).await?;

        // Sessions sharing a client key share one attempt budget
        let stored = match &self.store {
            Some(store) => {
                let client_key = session.lock().await.client_key.clone();
                match store.load(&client_key).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        tracing::warn!(error = %e, client_key = %client_key, "Failed to load attempt record; using the session copy");
                        None
                    }
                }
            }
            None => None,
        };

        let pending = {
            let now = self.now();
            let mut guard = session.lock().await;
            guard.touch(now);
            if let Some(stored) = &stored {
                guard.gate.merge_record(stored);
            }
            match guard.gate.begin(now) {
                Ok(pending) => pending,
                Err(e) => {
                    let result = Err(e);
                    self.record_outcome(&result);
                    return Ok(SubmitReport {
                        result,
                        view: guard.snapshot(now),
                    });
                }
            }
        };

        // Only the registry keeps the session alive while the backend works
        let handle = Arc::downgrade(&session);
        drop(session);

        let response = authenticator.attempt_login(&credentials).await;

        let live = match handle.upgrade() {
            Some(session) if self.is_registered(id, &session).await => Some(session),
            _ => None,
        };
        let Some(session) = live else {
            tracing::info!(
                session_id = %id,
                "Login session closed before the backend answered; result discarded"
            );
            return Err(GateError::SessionClosed(id.to_string()));
        };

        let now = self.now();
        let (result, view, client_key, record) = {
            let mut guard = session.lock().await;
            let result = guard.gate.complete(pending, response, now);
            // Apply the reset the gate just requested
            guard.widget.sync_reset();
            guard.touch(now);
            (
                result,
                guard.snapshot(now),
                guard.client_key.clone(),
                guard.gate.record(),
            )
        };

        self.record_outcome(&result);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&client_key, &record).await {
                tracing::error!(error = %e, client_key = %client_key, "Failed to persist attempt record");
            }
        }

        Ok(SubmitReport { result, view })
    }

    fn record_outcome(&self, result: &Result<Option<AdminGrant>, GateError>) {
        match result {
            Ok(_) => {
                self.stats.logins_ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_local_rejection() => {
                self.stats.local_rejections.fetch_add(1, Ordering::Relaxed);
            }
            Err(GateError::AuthenticationFailed {
                remaining_attempts: 0,
                ..
            }) => {
                self.stats.logins_failed.fetch_add(1, Ordering::Relaxed);
                self.stats.lockouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.logins_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Evict sessions idle longer than the TTL. Busy sessions are kept.
    pub async fn sweep(&self) -> usize {
        let now = self.now();
        let idle_ttl_ms = self.settings.idle_ttl.as_millis() as i64;

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => guard.gate.is_pending() || guard.idle_for(now) <= idle_ttl_ms,
            Err(_) => true,
        });
        let evicted = before - sessions.len();

        if evicted > 0 {
            self.stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            tracing::debug!(evicted, remaining = sessions.len(), "Idle login sessions evicted");
        }
        evicted
    }

    pub async fn stats(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            active_sessions: self.len().await,
            created: self.stats.created.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            logins_ok: self.stats.logins_ok.load(Ordering::Relaxed),
            logins_failed: self.stats.logins_failed.load(Ordering::Relaxed),
            lockouts: self.stats.lockouts.load(Ordering::Relaxed),
            local_rejections: self.stats.local_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Clear the miss styling after the ticket's delay, unless the session is gone
fn schedule_error_clear(session: Weak<Mutex<LoginSession>>, ticket: ErrorClear) {
    tokio::spawn(async move {
        tokio::time::sleep(ticket.delay).await;
        if let Some(session) = session.upgrade() {
            session.lock().await.widget.clear_error(ticket);
        }
    });
}

/// Generate a cryptographically random session ID
fn generate_session_id() -> String {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use rand::Rng;

    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Background worker that evicts idle login sessions
pub async fn session_sweeper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                registry.sweep().await;
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down");
                break;
            }
        }
    }
}
