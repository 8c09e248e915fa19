//! session-auth - Cookie-based session authentication over a key-value store
//!
//! This crate provides:
//! - Opaque session tokens with a fixed TTL and at most one live session per user
//! - A route classifier deciding which endpoints skip authentication
//! - An authentication gate resolving the `session` cookie to a user
//! - redb embedded store (ACID, crash-safe) or an in-memory store
//! - Active expiration via a background task
//! - REST API

pub mod api;
pub mod clock;
pub mod config;
pub mod expiration;
pub mod gate;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;
pub mod users;

use std::sync::Arc;

use config::Config;
use gate::AuthGate;
use storage::SessionStore;
use tokens::SessionManager;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub gate: AuthGate,
    pub sessions: SessionManager,
    pub store: Arc<dyn SessionStore>,
}
