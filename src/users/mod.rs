//! Account lookup and password verification consumed by the session manager.
//!
//! Both are owned by the host system; this module only defines the seams
//! and ships default implementations.

pub mod directory;
pub mod password;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use directory::StaticDirectory;
pub use password::Argon2Scheme;

/// An account as seen by the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    /// Stable account identifier, never changes after creation
    pub id: String,
    /// Stored password digest (never the plaintext)
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Duplicate user: {0}")]
    Duplicate(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid user file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("Malformed password digest: {0}")]
    MalformedDigest(argon2::password_hash::Error),
}

/// Account lookup.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    fn find_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError>;
}

/// Password hashing primitive.
pub trait PasswordScheme: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// `Ok(false)` on mismatch; `Err` only when the digest itself is unusable.
    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError>;
}
