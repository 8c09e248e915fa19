//! Session gate middleware
//!
//! Runs the authentication gate in front of every routed `/v1` request.
//! Bypassed routes pass through untouched; authenticated requests carry
//! their [`Principal`] in the request extensions for handlers to extract.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::response::ApiError;
use crate::gate::{GateOutcome, GateRejection, Principal};
use crate::AppState;

/// Middleware that rejects requests without a live session.
///
/// The handler is never invoked for a rejected request.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = state.gate.authenticate(
        request.uri().path(),
        request.method(),
        request.headers(),
    );

    match outcome {
        Ok(GateOutcome::Bypassed) => next.run(request).await,
        Ok(GateOutcome::Authenticated(principal)) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(rejection) => {
            tracing::debug!(
                path = %request.uri().path(),
                reason = %rejection,
                "Request rejected by session gate"
            );
            ApiError::unauthorized(rejection.to_string()).into_response()
        }
    }
}

/// Extracts the caller authenticated by [`require_session`].
///
/// Rejects with 401 when used on a route the gate bypassed.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(GateRejection::NoCredential.to_string()))
    }
}
