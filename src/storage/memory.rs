use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::models::StoredEntry;
use super::{expiry_from, validate_batch, CommandOutcome, SessionStore, StoreCommand, StoreError};
use crate::clock::{Clock, SystemClock};

/// In-process session store. Contents are lost on restart.
///
/// A batch is applied under one lock acquisition, which is what makes it
/// atomic for concurrent readers.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone()))
    }

    fn execute_atomic(
        &self,
        commands: &[StoreCommand],
    ) -> Result<Vec<CommandOutcome>, StoreError> {
        validate_batch(commands)?;
        let now = self.clock.now();

        // Resolve every expiry up front so nothing fails once mutation starts
        let mut staged = Vec::with_capacity(commands.len());
        for command in commands {
            let entry = match command {
                StoreCommand::Delete { .. } => None,
                StoreCommand::Set { value, .. } => Some(StoredEntry::persistent(value.clone())),
                StoreCommand::SetWithExpiration {
                    key,
                    ttl_seconds,
                    value,
                } => Some(StoredEntry::expiring(
                    value.clone(),
                    expiry_from(now, key, *ttl_seconds)?,
                )),
            };
            staged.push((command.key(), entry));
        }

        let mut entries = self.entries.lock();
        let outcomes: Vec<CommandOutcome> = staged
            .into_iter()
            .map(|(key, entry)| match entry {
                Some(entry) => {
                    entries.insert(key.to_string(), entry);
                    CommandOutcome::Written
                }
                None => {
                    let previous = entries.remove(key);
                    CommandOutcome::Deleted(previous.is_some_and(|e| !e.is_expired_at(now)))
                }
            })
            .collect();

        Ok(outcomes)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}
