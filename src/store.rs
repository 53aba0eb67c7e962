//! User Store
//!
//! Lookup interface onto wherever user records live. The gateway only needs
//! find/exists plus an atomic insert; persistence details belong to the
//! implementor.

use crate::types::{AuthError, Result, UserRecord};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::RwLock;

/// Synchronous user repository
pub trait UserStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    fn exists_by_username(&self, username: &str) -> Result<bool> {
        Ok(self.find_by_username(username)?.is_some())
    }

    /// Insert or replace the record keyed by its username
    fn save(&self, record: UserRecord) -> Result<()>;

    /// Insert a record only if its username is free
    ///
    /// Must be atomic with respect to other inserts: of two concurrent calls
    /// for one username, exactly one succeeds and the other gets
    /// [`AuthError::UsernameTaken`].
    fn insert_new(&self, record: UserRecord) -> Result<()>;
}

impl<S: UserStore + ?Sized> UserStore for std::sync::Arc<S> {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        (**self).find_by_username(username)
    }

    fn exists_by_username(&self, username: &str) -> Result<bool> {
        (**self).exists_by_username(username)
    }

    fn save(&self, record: UserRecord) -> Result<()> {
        (**self).save(record)
    }

    fn insert_new(&self, record: UserRecord) -> Result<()> {
        (**self).insert_new(record)
    }
}

/// Process-local store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        // Writers only insert whole records, so a poisoned map is still consistent
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Store("Lock poisoned".into()))?;
        Ok(users.get(username).cloned())
    }

    fn exists_by_username(&self, username: &str) -> Result<bool> {
        let users = self
            .users
            .read()
            .map_err(|_| AuthError::Store("Lock poisoned".into()))?;
        Ok(users.contains_key(username))
    }

    fn save(&self, record: UserRecord) -> Result<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Store("Lock poisoned".into()))?;
        users.insert(record.username.clone(), record);
        Ok(())
    }

    fn insert_new(&self, record: UserRecord) -> Result<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| AuthError::Store("Lock poisoned".into()))?;
        match users.entry(record.username.clone()) {
            Entry::Occupied(_) => Err(AuthError::UsernameTaken(record.username)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }
}
