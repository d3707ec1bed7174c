// src/storage/kv.rs
//! In-memory [`ServiceStorage`] backend.
//!
//! Suitable for tests and single-process deployments; contents are lost on exit.

use super::{ServiceStorage, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Namespaces = HashMap<String, HashMap<String, Vec<u8>>>;

/// Thread-safe in-memory storage keyed by namespace, then key.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<RwLock<Namespaces>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a namespace.
    pub async fn count(&self, namespace: &str) -> usize {
        self.records.read().await.get(namespace).map(HashMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl ServiceStorage for MemoryStorage {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn write(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.entry(namespace.to_string()).or_default().insert(key.to_string(), value);
        Ok(())
    }

    async fn write_if_absent(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let ns = records.entry(namespace.to_string()).or_default();
        if ns.contains_key(key) {
            return Ok(false);
        }
        ns.insert(key.to_string(), value);
        Ok(true)
    }
}
