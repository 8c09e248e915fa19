//! Per-request authentication decision.
//!
//! Each request moves from unchecked to exactly one of: bypassed (public
//! route), authenticated (principal resolved), or rejected.

pub mod classifier;
pub mod cookie;

use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use thiserror::Error;

use crate::tokens::SessionManager;

pub use classifier::RouteClassifier;
pub use cookie::SESSION_COOKIE;

/// The authenticated caller attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Token the request was authenticated with
    pub token: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(Principal),
    Bypassed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRejection {
    #[error("Invalid or expired session")]
    InvalidSession,
    #[error("No session credential provided")]
    NoCredential,
}

#[derive(Clone)]
pub struct AuthGate {
    classifier: Arc<RouteClassifier>,
    sessions: SessionManager,
}

impl AuthGate {
    pub fn new(classifier: RouteClassifier, sessions: SessionManager) -> Self {
        Self {
            classifier: Arc::new(classifier),
            sessions,
        }
    }

    /// Decide whether a request may proceed and on whose behalf.
    pub fn authenticate(
        &self,
        path: &str,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<GateOutcome, GateRejection> {
        if self.classifier.bypasses(path, method) {
            return Ok(GateOutcome::Bypassed);
        }

        let token = cookie::read_cookie(headers, SESSION_COOKIE)
            .filter(|t| !t.is_empty())
            .ok_or(GateRejection::NoCredential)?;

        match self.sessions.resolve_session(&token) {
            Ok(Some(user_id)) => Ok(GateOutcome::Authenticated(Principal { token, user_id })),
            Ok(None) => Err(GateRejection::InvalidSession),
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                Err(GateRejection::InvalidSession)
            }
        }
    }
}
