use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored value with its optional absolute expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// When the entry stops being visible (None = never)
    pub expires_at: Option<DateTime<Utc>>,
    /// Raw value bytes
    pub value: Vec<u8>,
}

impl StoredEntry {
    pub fn persistent(value: Vec<u8>) -> Self {
        Self {
            expires_at: None,
            value,
        }
    }

    pub fn expiring(value: Vec<u8>, expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            value,
        }
    }

    /// An entry is expired once `now` reaches its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}
