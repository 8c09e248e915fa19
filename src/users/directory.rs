use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use super::{DirectoryError, User, UserDirectory};

/// In-memory account directory, optionally seeded from a JSON file.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl StaticDirectory {
    pub fn new(users: Vec<User>) -> Result<Self, DirectoryError> {
        let directory = Self::default();
        for user in users {
            directory.insert(user)?;
        }
        Ok(directory)
    }

    /// Load a JSON array of `{ "id", "email", "password_hash" }` objects.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let data = std::fs::read(path)?;
        let users: Vec<User> = serde_json::from_slice(&data)?;
        Self::new(users)
    }

    /// Add an account. Ids and emails must be unique.
    pub fn insert(&self, user: User) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(DirectoryError::Duplicate(user.id));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(DirectoryError::Duplicate(user.email));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserDirectory for StaticDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.read().get(id).cloned())
    }
}
