use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::session_error;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::gate::cookie::{clear_session_cookie, session_cookie};
use crate::gate::Principal;
use crate::tokens::{Credentials, IssuedSession};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Log in with email and password. Any session the user already holds is revoked.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.clone();
    let issued = tokio::task::spawn_blocking(move || sessions.create_session(&credentials))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Login task failed");
            ApiError::internal()
        })?
        .map_err(session_error)?;

    tracing::info!(user_id = %issued.user_id, "Session created");
    Ok(issued_response(&state, issued))
}

/// Report who the session cookie belongs to.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<JSend<SessionStatusResponse>>, ApiError> {
    let user = state
        .sessions
        .directory()
        .find_by_id(&principal.user_id)
        .map_err(|e| {
            tracing::error!(error = %e, "User lookup failed");
            ApiError::internal()
        })?;

    Ok(JSend::success(SessionStatusResponse {
        email: user.map(|u| u.email),
        user_id: principal.user_id,
    }))
}

/// Rotate the caller's token. The old token stops working immediately.
pub async fn refresh_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .sessions
        .refresh_session(&principal.user_id, &principal.token)
        .map_err(session_error)?;

    tracing::info!(user_id = %issued.user_id, "Session refreshed");
    Ok(issued_response(&state, issued))
}

/// Log out and clear the cookie.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    state
        .sessions
        .delete_session(&principal.user_id, &principal.token)
        .map_err(session_error)?;

    tracing::info!(user_id = %principal.user_id, "Session deleted");
    Ok((
        [(SET_COOKIE, clear_session_cookie(state.config.server.cookie_secure))],
        JSend::success(()),
    ))
}

fn issued_response(state: &AppState, issued: IssuedSession) -> impl IntoResponse {
    let cookie = session_cookie(
        &issued.token,
        issued.max_age_seconds,
        state.config.server.cookie_secure,
    );
    (
        [(SET_COOKIE, cookie)],
        JSend::success(SessionResponse {
            session: issued.token,
        }),
    )
}
