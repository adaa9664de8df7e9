//! Login session endpoints: challenge pointer events and login submission.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use gate_common::constants::headers::X_CLIENT_ID;
use gate_common::GateError;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::auth::{AdminGrant, Credentials};
use crate::captcha::{PointerInput, WidgetLayout};
use crate::session::SessionView;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CreateSession {
    /// Host geometry; the configured layout is used when absent
    layout: Option<WidgetLayout>,
}

/// Create a login session
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let request: CreateSession = if body.is_empty() {
        CreateSession::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| GateError::InvalidInput(e.to_string()))?
    };

    let client_key = headers
        .get(X_CLIENT_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let view = state.sessions.create(client_key, request.layout).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current widget and gate state
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.view(&id).await?))
}

/// Tear a session down (page unload)
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.sessions.remove(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Forward one pointer event to the drag challenge
pub async fn pointer_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PointerInput>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.pointer(&id, input).await?))
}

#[derive(Serialize)]
pub struct LoginResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    grant: Option<AdminGrant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    session: SessionView,
}

/// Submit admin credentials through the attempt gate
pub async fn login(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<LoginResult>), ApiError> {
    if credentials.username.trim().is_empty() {
        return Err(GateError::InvalidInput("username is required".to_string()).into());
    }

    let report = state
        .sessions
        .submit(&id, credentials, state.authenticator.as_ref())
        .await?;

    let (status, body) = match report.result {
        Ok(grant) => (
            StatusCode::OK,
            LoginResult {
                success: true,
                grant,
                error: None,
                session: report.view,
            },
        ),
        Err(e) => (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            LoginResult {
                success: false,
                grant: None,
                error: Some(e.to_string()),
                session: report.view,
            },
        ),
    };

    Ok((status, Json(body)))
}
