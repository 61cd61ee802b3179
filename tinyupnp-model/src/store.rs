//! Persistent value storage
//!
//! Variables marked persistent survive restarts through a [`Store`]. Keys
//! are namespaced by the owning service's name so two services can both
//! keep a `Status` variable without colliding. The bundled [`MemoryStore`]
//! backs tests and devices that do not need durability; real firmware
//! would implement the trait over flash or a file.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Namespaced string key/value storage for persistent variables
pub trait Store: Send + Sync {
    /// Fetch the stored value for `key` within `scope`, if any
    fn load(&self, scope: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the value for `key` within `scope`, replacing any previous one
    fn save(&self, scope: &str, key: &str, value: &str) -> Result<(), StoreError>;

    /// Drop the stored value for `key` within `scope`
    fn remove(&self, scope: &str, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`Store`] with no durability
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, scope: &str, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        Ok(entries.get(&(scope.to_string(), key.to_string())).cloned())
    }

    fn save(&self, scope: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        entries.insert((scope.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        entries.remove(&(scope.to_string(), key.to_string()));
        Ok(())
    }
}
