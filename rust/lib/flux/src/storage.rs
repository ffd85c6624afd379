//! Persistent key-value slots (the browser's local storage, headless).
//!
//! Values are JSON text. A missing item is `Ok(None)`, never an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use redb::{Database, Table, TableDefinition};

use crate::error::StorageError;

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("slots");

/// Named-slot text storage.
pub trait PersistentStorage: Send + Sync {
    /// Read a slot. Returns `None` if it was never written.
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Write a slot, replacing any previous contents.
    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Removing a missing slot is not an error.
    fn remove_item(&self, name: &str) -> Result<(), StorageError>;
}

// ── MemoryStorage ──

/// In-process storage with an optional byte quota.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once the total stored bytes would exceed `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    fn used_excluding(items: &HashMap<String, String>, name: &str) -> usize {
        items
            .iter()
            .filter(|(k, _)| k.as_str() != name)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl PersistentStorage for MemoryStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError> {
        let items = self
            .items
            .read()
            .map_err(backend)?;
        Ok(items.get(name).cloned())
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .write()
            .map_err(backend)?;
        if let Some(quota) = self.quota {
            let needed = Self::used_excluding(&items, name) + name.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "writing '{}' needs {} bytes, quota is {}",
                    name, needed, quota
                )));
            }
        }
        items.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, name: &str) -> Result<(), StorageError> {
        let mut items = self
            .items
            .write()
            .map_err(backend)?;
        items.remove(name);
        Ok(())
    }
}

// ── RedbStorage ──

/// Durable storage backed by redb, so persisted slots survive restarts.
///
/// Every slot is one row of the `slots` table; each write is its own
/// transaction.
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create the state file at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let storage = Self {
            db: Arc::new(Database::create(path).map_err(backend)?),
        };
        // Create the table so reads on a fresh file find it.
        storage.write(|_| Ok(()))?;
        Ok(storage)
    }

    /// Run `op` against the slots table inside one committed write
    /// transaction.
    fn write<F>(&self, op: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Table<'_, &'static str, &'static str>) -> Result<(), redb::StorageError>,
    {
        let txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = txn.open_table(TABLE).map_err(backend)?;
            op(&mut table).map_err(backend)?;
        }
        txn.commit().map_err(backend)
    }
}

impl PersistentStorage for RedbStorage {
    fn get_item(&self, name: &str) -> Result<Option<String>, StorageError> {
        let txn = self.db.begin_read().map_err(backend)?;
        let table = txn.open_table(TABLE).map_err(backend)?;
        let item = table.get(name).map_err(backend)?;
        Ok(item.map(|guard| guard.value().to_string()))
    }

    fn set_item(&self, name: &str, value: &str) -> Result<(), StorageError> {
        self.write(|table| table.insert(name, value).map(|_| ()))
    }

    fn remove_item(&self, name: &str) -> Result<(), StorageError> {
        self.write(|table| table.remove(name).map(|_| ()))
    }
}

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}
