// src/storage/mod.rs
//! Persistence layer.
//!
//! Backends implement [`ServiceStorage`], a namespaced key/value contract in
//! which every single-record write is atomic. Services never talk to a backend
//! directly; they go through [`auth_storage::AuthStorage`], which encrypts
//! session records before they reach the backend.

pub mod auth_storage;
pub mod encryption;
pub mod ipfs_client;
pub mod kv;
pub mod redis_store;

use async_trait::async_trait;
use thiserror::Error;

/// Errors at the persistence boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failed: {0}")]
    Backend(String),

    #[error("could not encrypt record: {0}")]
    Encryption(String),

    #[error("could not decrypt record: {0}")]
    Decryption(String),

    #[error("could not (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(e: redis::RedisError) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Namespaced key/value storage.
///
/// Each write replaces or creates exactly one record and is all-or-nothing;
/// there are no multi-record transactions.
#[async_trait]
pub trait ServiceStorage: Send + Sync {
    /// Reads a record, `None` when absent.
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes a record, replacing any previous value.
    async fn write(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Writes a record only if the key is absent.
    ///
    /// Returns `true` when this call created the record.
    async fn write_if_absent(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<bool, StorageError>;

    async fn exists(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.read(namespace, key).await?.is_some())
    }
}
