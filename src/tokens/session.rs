use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use thiserror::Error;

use crate::storage::keys::{session_key, user_key};
use crate::storage::{SessionStore, StoreCommand, StoreError};
use crate::users::{DirectoryError, PasswordError, PasswordScheme, UserDirectory};

use super::generator::{generate_session_token, TokenError};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Unknown email or wrong password. The two are deliberately indistinguishable.
    #[error("Invalid credentials")]
    BadCredentials,
    #[error("User directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Token generation failed: {0}")]
    Token(#[from] TokenError),
    #[error("Password verification error: {0}")]
    Password(#[from] PasswordError),
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Everything except a credential mismatch is a server-side failure.
    pub fn is_internal(&self) -> bool {
        !matches!(self, SessionError::BadCredentials)
    }
}

/// Login request body
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Random bytes per token (hex doubles the length)
    pub token_bytes: usize,
    pub token_expiration_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_bytes: 16,
            token_expiration_minutes: 30,
        }
    }
}

/// Longest accepted session lifetime (one year)
pub const MAX_TOKEN_EXPIRATION_MINUTES: u64 = 365 * 24 * 60;

impl SessionConfig {
    /// Store TTL and cookie max-age. Saturates instead of wrapping.
    pub fn ttl_seconds(&self) -> u64 {
        self.token_expiration_minutes.saturating_mul(60)
    }
}

/// A freshly installed session, ready to be handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Cookie max-age; equals the store TTL
    pub max_age_seconds: u64,
    pub token: String,
    pub user_id: String,
}

/// Owns the `session:*` and `user:*` namespaces of the store.
///
/// Two logins racing for the same user can both see "no prior token" and
/// both succeed, leaving two live sessions until one expires. That window
/// is accepted; no cross-request locking is done here.
#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
    directory: Arc<dyn UserDirectory>,
    /// Digest verified against when the email is unknown, hashed on first use
    dummy_digest: Arc<OnceLock<Option<String>>>,
    passwords: Arc<dyn PasswordScheme>,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn UserDirectory>,
        passwords: Arc<dyn PasswordScheme>,
    ) -> Self {
        Self {
            config,
            directory,
            dummy_digest: Arc::new(OnceLock::new()),
            passwords,
            store,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Log a user in, replacing any session they already hold.
    pub fn create_session(&self, credentials: &Credentials) -> Result<IssuedSession, SessionError> {
        let Some(user) = self.directory.find_by_email(&credentials.email)? else {
            // Spend the same hashing work as a real mismatch
            self.verify_dummy(&credentials.password);
            return Err(SessionError::BadCredentials);
        };

        if !self
            .passwords
            .verify(&credentials.password, &user.password_hash)?
        {
            return Err(SessionError::BadCredentials);
        }

        // Revoke the previous session first; a failure here aborts the login
        // rather than leaving the old token valid next to the new one.
        if let Some(previous) = self.current_session(&user.id)? {
            self.store.delete(&session_key(&previous))?;
            tracing::debug!(user_id = %user.id, "Revoked previous session");
        }

        let issued = self.install(&user.id)?;
        tracing::debug!(user_id = %user.id, "Created session");
        Ok(issued)
    }

    /// Rotate an authenticated user's token and reset its TTL.
    pub fn refresh_session(
        &self,
        user_id: &str,
        current_token: &str,
    ) -> Result<IssuedSession, SessionError> {
        self.store.delete(&session_key(current_token))?;

        let issued = self.install(user_id)?;
        tracing::debug!(user_id = %user_id, "Refreshed session");
        Ok(issued)
    }

    /// Log out. Calling this for an already-dead session is not an error.
    pub fn delete_session(&self, user_id: &str, current_token: &str) -> Result<(), SessionError> {
        let deleted = self.store.delete(&session_key(current_token))?;
        // The pointer is blanked, not removed; readers treat empty as absent.
        self.store.set(&user_key(user_id), &[])?;

        if deleted {
            tracing::debug!(user_id = %user_id, "Deleted session");
        }
        Ok(())
    }

    /// Resolve a token to its owner. Absent, expired and empty all map to `None`.
    pub fn resolve_session(&self, token: &str) -> Result<Option<String>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .get(&session_key(token))?
            .and_then(non_empty_string))
    }

    /// The token the user pointer currently names, if any.
    pub fn current_session(&self, user_id: &str) -> Result<Option<String>, SessionError> {
        Ok(self.store.get(&user_key(user_id))?.and_then(non_empty_string))
    }

    fn verify_dummy(&self, password: &str) {
        let digest = self
            .dummy_digest
            .get_or_init(|| self.passwords.hash("session-auth-unknown-account").ok());
        if let Some(digest) = digest {
            let _ = self.passwords.verify(password, digest);
        }
    }

    /// Generate a token and write both index entries in one batch.
    fn install(&self, user_id: &str) -> Result<IssuedSession, SessionError> {
        let token = generate_session_token(self.config.token_bytes)?;
        let ttl_seconds = self.config.ttl_seconds();

        self.store.execute_atomic(&[
            StoreCommand::set_with_expiration(session_key(&token), user_id, ttl_seconds),
            StoreCommand::set(user_key(user_id), token.as_str()),
        ])?;

        Ok(IssuedSession {
            max_age_seconds: ttl_seconds,
            token,
            user_id: user_id.to_string(),
        })
    }
}

fn non_empty_string(bytes: Vec<u8>) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
