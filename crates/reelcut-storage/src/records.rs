//! Keyed record store for catalog metadata.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};

/// Narrow create/get/update/delete contract over keyed records.
#[async_trait]
pub trait RecordStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Insert a new record. Fails if `key` is already present.
    async fn create(&self, key: &str, record: T) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<T>>;

    /// Replace an existing record. Fails if `key` is unknown.
    async fn update(&self, key: &str, record: T) -> StorageResult<()>;

    /// Remove a record, returning whether it existed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    async fn list(&self) -> StorageResult<Vec<T>>;
}

/// In-process record store.
#[derive(Debug)]
pub struct MemoryRecordStore<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> Default for MemoryRecordStore<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> MemoryRecordStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl<T> RecordStore<T> for MemoryRecordStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn create(&self, key: &str, record: T) -> StorageResult<()> {
        let mut records = self.records.write();
        if records.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        records.insert(key.to_string(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn update(&self, key: &str, record: T) -> StorageResult<()> {
        match self.records.write().get_mut(key) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StorageError::not_found(key)),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    async fn list(&self) -> StorageResult<Vec<T>> {
        Ok(self.records.read().values().cloned().collect())
    }
}
