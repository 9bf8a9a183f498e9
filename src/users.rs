//! In-memory user directory.
//!
//! Demo seed data standing in for a real user database; passwords are
//! compared as provided. The directory is injected into the server the same
//! way a database handle would be, so tests can seed their own users.

use dashmap::DashMap;

/// A registered user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    password: String,
}

/// Registry of users, keyed by username.
pub struct UserDirectory {
    users: DashMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    /// Register a user and return the minted user id.
    pub fn insert(&self, username: &str, password: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.users.insert(
            username.to_string(),
            UserRecord {
                id: id.clone(),
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        id
    }

    /// Check a username/password pair, returning the user on success.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<UserRecord> {
        let user = self.users.get(username)?;
        if user.password == password {
            Some(user.value().clone())
        } else {
            None
        }
    }

    /// Look up a user by username.
    pub fn get(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).map(|u| u.value().clone())
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}
