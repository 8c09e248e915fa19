use chrono::{DateTime, Utc};
use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::models::StoredEntry;
use super::tables::*;
use super::{expiry_from, validate_batch, CommandOutcome, SessionStore, StoreCommand, StoreError};
use crate::clock::{Clock, SystemClock};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Deserialization error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("Serialization error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

/// Embedded session store on top of redb.
///
/// Every `execute_atomic` batch runs in a single write transaction, so a
/// failure part-way through leaves nothing behind.
#[derive(Clone)]
pub struct Database {
    clock: Arc<dyn Clock>,
    db: Arc<RedbDatabase>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        Self::open_with_clock(data_dir, Arc::new(SystemClock))
    }

    /// Open or create a database that reads time from `clock`
    pub fn open_with_clock<P: AsRef<Path>>(
        data_dir: P,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("session-auth.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTRIES)?;
            let _ = write_txn.open_table(ENTRY_EXPIRY)?;
        }
        write_txn.commit()?;

        Ok(Self {
            clock,
            db: Arc::new(db),
        })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    fn read_entry(&self, key: &str) -> Result<Option<StoredEntry>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;

        match table.get(key)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Delete expired entries using the expiration index (no full table scan).
    fn delete_expired_entries(&self) -> Result<usize, DatabaseError> {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();

        // Phase 1: collect index rows that are due
        let due: Vec<(String, String)> = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(ENTRY_EXPIRY)?;
            let mut result = Vec::new();
            for entry in table.iter()? {
                let (index_key, key) = entry?;
                let index_key = index_key.value().to_string();
                match expiry_key_ms(&index_key) {
                    Some(ms) if ms <= now_ms => result.push((index_key, key.value().to_string())),
                    _ => break,
                }
            }
            result
        };

        if due.is_empty() {
            return Ok(0);
        }

        // Phase 2: drop the entries that are still expired, then their index rows
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        for (index_key, key) in &due {
            let current: Option<StoredEntry> = {
                let table = write_txn.open_table(ENTRIES)?;
                let result = match table.get(key.as_str())? {
                    Some(data) => Some(rmp_serde::from_slice(data.value())?),
                    None => None,
                };
                result
            };

            // The index is millisecond-grained, so a due row can still point
            // at an entry a few microseconds short of expiring. Keep that row.
            let keep_row = match current {
                Some(entry) if entry.is_expired_at(now) => {
                    let mut table = write_txn.open_table(ENTRIES)?;
                    table.remove(key.as_str())?;
                    removed += 1;
                    false
                }
                Some(entry) => entry
                    .expires_at
                    .is_some_and(|at| expiry_key(&at, key) == *index_key),
                None => false,
            };

            if !keep_row {
                let mut expiry_table = write_txn.open_table(ENTRY_EXPIRY)?;
                expiry_table.remove(index_key.as_str())?;
            }
        }
        write_txn.commit()?;

        Ok(removed)
    }
}

/// Remove `key` inside `write_txn`, returning the entry it held.
fn remove_entry(
    write_txn: &WriteTransaction,
    key: &str,
) -> Result<Option<StoredEntry>, DatabaseError> {
    let previous: Option<StoredEntry> = {
        let mut table = write_txn.open_table(ENTRIES)?;
        let removed = table.remove(key)?;
        let result = match removed {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        result
    };

    if let Some(expires_at) = previous.as_ref().and_then(|e| e.expires_at) {
        let mut expiry_table = write_txn.open_table(ENTRY_EXPIRY)?;
        expiry_table.remove(expiry_key(&expires_at, key).as_str())?;
    }

    Ok(previous)
}

/// Replace `key` inside `write_txn`, keeping the expiration index in step.
fn write_entry(
    write_txn: &WriteTransaction,
    key: &str,
    entry: &StoredEntry,
) -> Result<(), DatabaseError> {
    remove_entry(write_txn, key)?;

    {
        let mut table = write_txn.open_table(ENTRIES)?;
        let data = rmp_serde::to_vec_named(entry)?;
        table.insert(key, data.as_slice())?;
    }

    if let Some(expires_at) = entry.expires_at {
        let mut expiry_table = write_txn.open_table(ENTRY_EXPIRY)?;
        expiry_table.insert(expiry_key(&expires_at, key).as_str(), key)?;
    }

    Ok(())
}

/// Build an expiration index key that sorts by expiry time.
pub fn expiry_key(expires_at: &DateTime<Utc>, key: &str) -> String {
    format!("{:020}:{key}", expires_at.timestamp_millis().max(0))
}

/// Extract the expiry millis from an expiration index key.
pub fn expiry_key_ms(index_key: &str) -> Option<i64> {
    index_key.split_once(':')?.0.parse().ok()
}

impl SessionStore for Database {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .read_entry(key)?
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value))
    }

    fn execute_atomic(
        &self,
        commands: &[StoreCommand],
    ) -> Result<Vec<CommandOutcome>, StoreError> {
        validate_batch(commands)?;
        let now = self.clock.now();

        let write_txn = self.begin_write()?;
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome = match command {
                StoreCommand::Delete { key } => {
                    let previous = remove_entry(&write_txn, key)?;
                    CommandOutcome::Deleted(previous.is_some_and(|e| !e.is_expired_at(now)))
                }
                StoreCommand::Set { key, value } => {
                    write_entry(&write_txn, key, &StoredEntry::persistent(value.clone()))?;
                    CommandOutcome::Written
                }
                StoreCommand::SetWithExpiration {
                    key,
                    ttl_seconds,
                    value,
                } => {
                    let expires_at = expiry_from(now, key, *ttl_seconds)?;
                    write_entry(
                        &write_txn,
                        key,
                        &StoredEntry::expiring(value.clone(), expires_at),
                    )?;
                    CommandOutcome::Written
                }
            };
            outcomes.push(outcome);
        }
        // Dropping the transaction on an early return aborts the whole batch
        write_txn.commit().map_err(DatabaseError::from)?;

        Ok(outcomes)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(self.delete_expired_entries()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use redb::ReadableTableMetadata;
    use tempfile::TempDir;

    fn setup_db() -> (Database, ManualClock, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let clock = ManualClock::default();
        let db = Database::open_with_clock(temp_dir.path(), Arc::new(clock.clone())).unwrap();
        (db, clock, temp_dir)
    }

    #[test]
    fn test_set_get_delete() {
        let (db, _clock, _temp) = setup_db();

        db.set("user:u1:session", b"ABC").unwrap();
        assert_eq!(db.get("user:u1:session").unwrap().as_deref(), Some(&b"ABC"[..]));
        assert!(db.exists("user:u1:session").unwrap());

        assert!(db.delete("user:u1:session").unwrap());
        assert!(db.get("user:u1:session").unwrap().is_none());

        // Idempotent
        assert!(!db.delete("user:u1:session").unwrap());
    }

    #[test]
    fn test_expired_entry_is_invisible() {
        let (db, clock, _temp) = setup_db();

        db.set_with_expiration("session:T:userID", b"u1", 60).unwrap();
        clock.advance(Duration::seconds(59));
        assert!(db.exists("session:T:userID").unwrap());

        clock.advance(Duration::seconds(1));
        assert!(db.get("session:T:userID").unwrap().is_none());
        assert!(!db.exists("session:T:userID").unwrap());
    }

    #[test]
    fn test_atomic_batch_applies_all_commands() {
        let (db, _clock, _temp) = setup_db();

        let outcomes = db
            .execute_atomic(&[
                StoreCommand::set_with_expiration("session:T:userID", "u1", 1800),
                StoreCommand::set("user:u1:session", "T"),
            ])
            .unwrap();

        assert_eq!(outcomes, vec![CommandOutcome::Written, CommandOutcome::Written]);
        assert_eq!(db.get("session:T:userID").unwrap().unwrap(), b"u1");
        assert_eq!(db.get("user:u1:session").unwrap().unwrap(), b"T");
    }

    #[test]
    fn test_invalid_batch_writes_nothing() {
        let (db, _clock, _temp) = setup_db();

        let result = db.execute_atomic(&[
            StoreCommand::set("user:u1:session", "T"),
            StoreCommand::set_with_expiration("session:T:userID", "u1", 0),
        ]);

        assert!(matches!(result, Err(StoreError::InvalidExpiration { .. })));
        assert!(db.get("user:u1:session").unwrap().is_none());
    }

    #[test]
    fn test_overwrite_clears_old_expiry() {
        let (db, clock, _temp) = setup_db();

        db.set_with_expiration("k", b"v1", 10).unwrap();
        db.set("k", b"v2").unwrap();
        clock.advance(Duration::seconds(20));

        assert_eq!(db.get("k").unwrap().unwrap(), b"v2");
        assert_eq!(db.purge_expired().unwrap(), 0);
        assert_eq!(db.get("k").unwrap().unwrap(), b"v2");
    }

    #[test]
    fn test_purge_expired() {
        let (db, clock, _temp) = setup_db();

        db.set_with_expiration("short", b"a", 10).unwrap();
        db.set_with_expiration("long", b"b", 100).unwrap();
        db.set("forever", b"c").unwrap();

        clock.advance(Duration::seconds(11));
        assert_eq!(db.purge_expired().unwrap(), 1);
        assert_eq!(db.purge_expired().unwrap(), 0);

        // The expired row is physically gone, not just hidden
        assert!(db.read_entry("short").unwrap().is_none());
        assert!(db.exists("long").unwrap());
        assert!(db.exists("forever").unwrap());
    }

    #[test]
    fn test_purge_within_expiry_millisecond_keeps_index_row() {
        let temp_dir = TempDir::new().unwrap();
        let start = DateTime::from_timestamp(1_700_000_000, 500_500_000).unwrap();
        let clock = ManualClock::new(start);
        let db = Database::open_with_clock(temp_dir.path(), Arc::new(clock.clone())).unwrap();

        db.set_with_expiration("session:T:userID", b"u1", 60).unwrap();

        // Same millisecond as the expiry, 200us before it
        clock.advance(Duration::microseconds(59_999_800));
        assert_eq!(db.purge_expired().unwrap(), 0);
        assert!(db.exists("session:T:userID").unwrap());

        clock.advance(Duration::hours(1));
        assert_eq!(db.purge_expired().unwrap(), 1);
        assert!(db.read_entry("session:T:userID").unwrap().is_none());

        let read_txn = db.begin_read().unwrap();
        let expiry_table = read_txn.open_table(ENTRY_EXPIRY).unwrap();
        assert_eq!(expiry_table.len().unwrap(), 0);
    }

    #[test]
    fn test_delete_of_expired_key_reports_absent() {
        let (db, clock, _temp) = setup_db();

        db.set_with_expiration("k", b"v", 5).unwrap();
        clock.advance(Duration::seconds(6));

        assert!(!db.delete("k").unwrap());
    }

    #[test]
    fn test_expiry_key_ordering() {
        let earlier = Utc::now();
        let later = earlier + Duration::seconds(1);
        let a = expiry_key(&earlier, "zzz");
        let b = expiry_key(&later, "aaa");

        assert!(a < b);
        assert_eq!(expiry_key_ms(&a), Some(earlier.timestamp_millis()));
    }
}
