//! Health check endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::session::SessionStatsSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    /// `None` when no Redis backend is configured
    redis: Option<bool>,
}

/// Readiness check (are all dependencies healthy?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    let Some(redis) = state.redis.clone() else {
        return Ok(Json(ReadyResponse {
            status: "ready",
            redis: None,
        }));
    };

    if check_redis(redis).await {
        Ok(Json(ReadyResponse {
            status: "ready",
            redis: Some(true),
        }))
    } else {
        // Return 503 if not ready
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn check_redis(mut conn: redis::aio::ConnectionManager) -> bool {
    let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
    result.is_ok()
}

#[derive(Serialize)]
pub struct MetricsResponse {
    uptime_secs: u64,
    max_attempts: u32,
    lockout_duration_ms: i64,
    #[serde(flatten)]
    sessions: SessionStatsSnapshot,
}

/// Metrics endpoint (for monitoring)
pub async fn metrics(
    State(state): State<AppState>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        max_attempts: state.config.lockout.max_attempts,
        lockout_duration_ms: state.config.lockout.lockout_duration_ms,
        sessions: state.sessions.stats().await,
    })
}
