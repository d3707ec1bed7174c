// src/services/keystore.rs
//! Key management collaborator.
//!
//! Holds symmetric keys by id, such as the session JWE content key shared with
//! the relayer. Keys are encrypted at rest like session records.

use crate::error::AccessError;
use crate::storage::encryption::{Encrypter, NoopEncrypter};
use crate::storage::ServiceStorage;
use async_trait::async_trait;
use std::sync::Arc;

pub const KEYSTORE_NAMESPACE: &str = "keystore";

/// Lookup of key material by key id.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Returns the raw key stored under `id`.
    ///
    /// # Errors
    /// Returns [`AccessError::NotFound`] for unknown ids.
    async fn get_key(&self, id: &str) -> Result<Vec<u8>, AccessError>;
}

/// Key store persisted in the service storage.
#[derive(Clone)]
pub struct StorageKeyStore {
    db: Arc<dyn ServiceStorage>,
    encrypter: Arc<dyn Encrypter>,
}

impl StorageKeyStore {
    pub fn new(db: Arc<dyn ServiceStorage>, encrypter: Option<Arc<dyn Encrypter>>) -> Self {
        Self {
            db,
            encrypter: encrypter.unwrap_or_else(|| Arc::new(NoopEncrypter)),
        }
    }

    /// Stores `key` under `id`, replacing any previous key.
    pub async fn store_key(&self, id: &str, key: &[u8]) -> Result<(), AccessError> {
        if id.is_empty() || key.is_empty() {
            return Err(AccessError::Validation("key id and key material are required".into()));
        }
        let sealed = self.encrypter.encrypt(key).await?;
        self.db.write(KEYSTORE_NAMESPACE, id, sealed).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyStore for StorageKeyStore {
    async fn get_key(&self, id: &str) -> Result<Vec<u8>, AccessError> {
        let sealed = self
            .db
            .read(KEYSTORE_NAMESPACE, id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("key {}", id)))?;
        Ok(self.encrypter.decrypt(&sealed).await?)
    }
}
