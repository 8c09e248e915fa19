//! Key-value backends holding the session and user indices.

pub mod db;
pub mod keys;
mod memory;
pub mod models;
mod tables;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub use db::{Database, DatabaseError};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Invalid expiration for key {key}")]
    InvalidExpiration { key: String },
}

/// A single mutation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    Delete {
        key: String,
    },
    Set {
        key: String,
        value: Vec<u8>,
    },
    SetWithExpiration {
        key: String,
        ttl_seconds: u64,
        value: Vec<u8>,
    },
}

impl StoreCommand {
    pub fn delete(key: impl Into<String>) -> Self {
        StoreCommand::Delete { key: key.into() }
    }

    pub fn set(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        StoreCommand::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn set_with_expiration(
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        ttl_seconds: u64,
    ) -> Self {
        StoreCommand::SetWithExpiration {
            key: key.into(),
            ttl_seconds,
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StoreCommand::Delete { key }
            | StoreCommand::Set { key, .. }
            | StoreCommand::SetWithExpiration { key, .. } => key,
        }
    }
}

/// Result of one command in an atomic batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Whether a live entry was removed
    Deleted(bool),
    Written,
}

/// Key-value store backing the session indices.
///
/// Implementations must make expired entries invisible to `get` and
/// `exists` as soon as their TTL elapses, and must apply an
/// `execute_atomic` batch as one unit: concurrent readers see all of it
/// or none of it.
pub trait SessionStore: Send + Sync {
    /// Read a live value.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Apply every command or none of them.
    fn execute_atomic(
        &self,
        commands: &[StoreCommand],
    ) -> Result<Vec<CommandOutcome>, StoreError>;

    /// Remove entries whose TTL has elapsed, returning how many were dropped.
    fn purge_expired(&self) -> Result<usize, StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.execute_atomic(&[StoreCommand::set(key, value)])?;
        Ok(())
    }

    fn set_with_expiration(
        &self,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        self.execute_atomic(&[StoreCommand::set_with_expiration(key, value, ttl_seconds)])?;
        Ok(())
    }

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let outcomes = self.execute_atomic(&[StoreCommand::delete(key)])?;
        Ok(matches!(outcomes.first(), Some(CommandOutcome::Deleted(true))))
    }
}

/// Reject a batch before any of it is applied.
pub(crate) fn validate_batch(commands: &[StoreCommand]) -> Result<(), StoreError> {
    for command in commands {
        if let StoreCommand::SetWithExpiration {
            key,
            ttl_seconds: 0,
            ..
        } = command
        {
            return Err(StoreError::InvalidExpiration { key: key.clone() });
        }
    }
    Ok(())
}

/// Absolute expiry instant for a TTL applied at `now`.
pub(crate) fn expiry_from(
    now: DateTime<Utc>,
    key: &str,
    ttl_seconds: u64,
) -> Result<DateTime<Utc>, StoreError> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| StoreError::InvalidExpiration {
            key: key.to_string(),
        })
}
