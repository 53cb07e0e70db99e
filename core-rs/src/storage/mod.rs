// storage/mod.rs - Keyed storage collections
//
// Registries persist resources as JSON documents in a keyed collection.
// The DataCollection trait abstracts the backend; MemoryCollection is the
// built-in implementation used by default and in tests.

use crate::errors::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A keyed collection of JSON documents.
///
/// All methods suspend at well-defined points; implementations must be
/// shareable across tasks.
#[async_trait]
pub trait DataCollection: Send + Sync {
    /// Get the document stored under `id`.
    ///
    /// # Errors
    /// `ResourceNotFound` if no document exists
    async fn get(&self, id: &str) -> Result<Value>;

    /// Get all documents, in a deterministic order.
    async fn get_all(&self) -> Result<Vec<Value>>;

    /// True if a document exists under `id`.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Store a new document under `id`.
    ///
    /// # Errors
    /// `DuplicateResource` if one already exists
    async fn add(&self, id: &str, object: Value) -> Result<()>;

    /// Replace the document under `id`.
    ///
    /// # Errors
    /// `ResourceNotFound` if none exists
    async fn update(&self, id: &str, object: Value) -> Result<()>;

    /// Remove the document under `id`.
    ///
    /// # Errors
    /// `ResourceNotFound` if none exists
    async fn remove(&self, id: &str) -> Result<()>;
}

/// In-memory collection over an ordered map, so `get_all` is stable.
pub struct MemoryCollection {
    name: String,
    objects: RwLock<BTreeMap<String, Value>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryCollection {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DataCollection for MemoryCollection {
    async fn get(&self, id: &str) -> Result<Value> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ResourceNotFound {
                registry: self.name.clone(),
                id: id.to_string(),
            })
    }

    async fn get_all(&self) -> Result<Vec<Value>> {
        Ok(self.read().values().cloned().collect())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.read().contains_key(id))
    }

    async fn add(&self, id: &str, object: Value) -> Result<()> {
        let mut objects = self.write();
        if objects.contains_key(id) {
            return Err(StoreError::DuplicateResource {
                registry: self.name.clone(),
                id: id.to_string(),
            });
        }
        objects.insert(id.to_string(), object);
        Ok(())
    }

    async fn update(&self, id: &str, object: Value) -> Result<()> {
        let mut objects = self.write();
        match objects.get_mut(id) {
            Some(slot) => {
                *slot = object;
                Ok(())
            }
            None => Err(StoreError::ResourceNotFound {
                registry: self.name.clone(),
                id: id.to_string(),
            }),
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut objects = self.write();
        match objects.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::ResourceNotFound {
                registry: self.name.clone(),
                id: id.to_string(),
            }),
        }
    }
}
