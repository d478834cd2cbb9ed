//! Durable session persistence.
//!
//! The token and the user profile live under two separate keys; a session
//! exists only when both are present.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::models::{Credential, Session, User};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const CURRENT_USER_KEY: &str = "currentUser";

/// Origin-scoped string storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn save(&self, credential: &Credential, user: &User) -> StorageResult<()> {
        let user_json = serde_json::to_string(user)?;
        self.storage.set(AUTH_TOKEN_KEY, credential.token())?;
        self.storage.set(CURRENT_USER_KEY, &user_json)?;
        debug!(username = %user.username, "session persisted");
        Ok(())
    }

    /// Returns the persisted session, if both halves are present and readable.
    pub fn load(&self) -> Option<Session> {
        let token = match self.storage.get(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(e) => {
                warn!("Failed to read {AUTH_TOKEN_KEY}: {e}");
                return None;
            }
        };
        let user_json = match self.storage.get(CURRENT_USER_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {CURRENT_USER_KEY}: {e}");
                return None;
            }
        };

        match serde_json::from_str::<User>(&user_json) {
            Ok(user) => Some(Session {
                credential: Credential::new(token),
                user,
            }),
            Err(e) => {
                warn!("Discarding unreadable {CURRENT_USER_KEY}: {e}");
                if let Err(e) = self.clear() {
                    warn!("Failed to clear session: {e}");
                }
                None
            }
        }
    }

    pub fn clear(&self) -> StorageResult<()> {
        self.storage.remove(AUTH_TOKEN_KEY)?;
        self.storage.remove(CURRENT_USER_KEY)?;
        debug!("session cleared");
        Ok(())
    }
}
