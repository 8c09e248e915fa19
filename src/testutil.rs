//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{Config, ServerConfig, StoreBackend, StoreConfig};
use crate::gate::{AuthGate, RouteClassifier};
use crate::storage::{
    CommandOutcome, DatabaseError, MemoryStore, SessionStore, StoreCommand, StoreError,
};
use crate::tokens::{SessionConfig, SessionManager};
use crate::users::{Argon2Scheme, PasswordScheme, StaticDirectory, User};
use crate::AppState;

/// Directory holding `a@x.com`/`p1` (`user-a`) and `b@x.com`/`p2` (`user-b`).
pub fn seeded_directory() -> StaticDirectory {
    let scheme = Argon2Scheme;
    let user = |id: &str, email: &str, password: &str| User {
        email: email.to_string(),
        id: id.to_string(),
        password_hash: scheme.hash(password).unwrap(),
    };
    StaticDirectory::new(vec![
        user("user-a", "a@x.com", "p1"),
        user("user-b", "b@x.com", "p2"),
    ])
    .unwrap()
}

/// In-memory store whose reads or deletes can be switched to fail.
#[derive(Default)]
pub struct FaultyStore {
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
    inner: MemoryStore,
}

impl FaultyStore {
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

fn injected_failure() -> StoreError {
    StoreError::Database(DatabaseError::Io(io::Error::new(
        io::ErrorKind::Other,
        "injected failure",
    )))
}

impl SessionStore for FaultyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.inner.get(key)
    }

    fn execute_atomic(
        &self,
        commands: &[StoreCommand],
    ) -> Result<Vec<CommandOutcome>, StoreError> {
        let has_delete = commands
            .iter()
            .any(|c| matches!(c, StoreCommand::Delete { .. }));
        if has_delete && self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.inner.execute_atomic(commands)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired()
    }
}

fn manager(store: Arc<dyn SessionStore>) -> SessionManager {
    SessionManager::new(
        SessionConfig::default(),
        store,
        Arc::new(seeded_directory()),
        Arc::new(Argon2Scheme),
    )
}

/// Session manager over an empty `MemoryStore` and the seeded directory.
pub fn memory_manager() -> SessionManager {
    manager(Arc::new(MemoryStore::new()))
}

/// Session manager whose store fails every read.
pub fn failing_store_manager() -> SessionManager {
    let store = FaultyStore::default();
    store.fail_reads(true);
    manager(Arc::new(store))
}

/// A minimal `Config` suitable for unit tests (memory backend).
pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:8080".to_string(),
            ..ServerConfig::default()
        },
        sessions: SessionConfig::default(),
        store: StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        },
        users_file: None,
    }
}

/// Build a full `Arc<AppState>` around the given store.
pub fn test_state(store: Arc<dyn SessionStore>) -> Arc<AppState> {
    let config = test_config();
    let sessions = manager(Arc::clone(&store));
    let gate = AuthGate::new(RouteClassifier::default(), sessions.clone());
    Arc::new(AppState {
        config,
        gate,
        sessions,
        store,
    })
}
