//! HTTP route handlers for Gatehouse.

use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gate_common::GateError;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod sessions;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // Login sessions (drag challenge + attempt gate)
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{id}/pointer", post(sessions::pointer_event))
        .route("/sessions/{id}/login", post(sessions::login))

        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .layer(CorsLayer::permissive())

        // Add shared state
        .with_state(state)
}

/// JSON error body carrying the status from [`GateError::status_code`]
pub struct ApiError(pub GateError);

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticAuthenticator, quick_hash};
    use crate::config::AppConfig;
    use crate::session::{SessionRegistry, system_clock};
    use crate::state::session_settings;
    use axum::body::Body;
    use axum::http::{Request, header};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig::default();
        let mut admins = HashMap::new();
        admins.insert(
            "curator".to_string(),
            quick_hash("relic-42"),
        );
        let authenticator = Arc::new(StaticAuthenticator::new(admins, 3600));
        let sessions = Arc::new(SessionRegistry::new(
            session_settings(&config),
            None,
            system_clock(),
        ));
        create_router(AppState::from_parts(config, None, authenticator, sessions))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redis"], Value::Null);
    }

    #[tokio::test]
    async fn test_login_flow_over_http() {
        let app = app();
        let (status, created) = send(&app, "POST", "/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["session_id"].as_str().unwrap().to_string();
        assert_eq!(created["widget"]["slot"], "middle_right");

        // submitting before the challenge is solved is refused locally
        let login = json!({ "username": "curator", "password": "relic-42" });
        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/login"), Some(login.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please complete the verification first.");

        let pointer = format!("/sessions/{id}/pointer");
        send(&app, "POST", &pointer, Some(json!({ "phase": "down", "x": 30, "y": 150 }))).await;
        let (_, view) = send(&app, "POST", &pointer, Some(json!({ "phase": "up", "x": 270, "y": 90 }))).await;
        assert_eq!(view["widget"]["verified"], true);

        let wrong = json!({ "username": "curator", "password": "nope" });
        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/login"), Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid username or password. 4 attempts remaining.");
        assert_eq!(body["session"]["widget"]["verified"], false);

        send(&app, "POST", &pointer, Some(json!({ "kind": "touch", "phase": "down", "x": 30, "y": 150 }))).await;
        send(&app, "POST", &pointer, Some(json!({ "kind": "touch", "phase": "up", "x": 260, "y": 70 }))).await;
        let (status, body) = send(&app, "POST", &format!("/sessions/{id}/login"), Some(login)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["grant"]["username"], "curator");

        let (status, _) = send(&app, "DELETE", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, "GET", &format!("/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().starts_with("Not found"));
    }

    #[tokio::test]
    async fn test_custom_layout_and_bad_body() {
        let app = app();
        let layout = json!({
            "layout": {
                "container": { "left": 100, "top": 100, "width": 320, "height": 180 },
                "track": { "left": 120, "top": 230, "width": 280, "height": 40 },
                "token": { "width": 40, "height": 40 },
                "target": { "width": 60, "height": 60 }
            }
        });
        let (status, body) = send(&app, "POST", "/sessions", Some(layout)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["widget"]["target"]["left"], 340.0);

        let (status, _) = send(&app, "POST", "/sessions", Some(json!({ "layout": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metrics() {
        let app = app();
        send(&app, "POST", "/sessions", None).await;
        let (status, body) = send(&app, "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_sessions"], 1);
        assert_eq!(body["max_attempts"], 5);
    }
}
