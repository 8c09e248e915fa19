mod admin;
mod sessions;

use crate::api::response::ApiError;
use crate::tokens::SessionError;

pub use admin::{health, HealthResponse};
pub use sessions::{
    create_session, delete_session, get_session, refresh_session, SessionResponse,
    SessionStatusResponse,
};

/// Map a SessionError to an ApiError
fn session_error(e: SessionError) -> ApiError {
    if e.is_internal() {
        tracing::error!(error = %e, "Session operation failed");
        return ApiError::internal();
    }
    ApiError::unauthorized(e.to_string())
}
