// src/services/presentation.rs
//! Presentation definition collaborator.
//!
//! A policy is published for one presentation definition: the document telling
//! a holder which credentials to prove. Definitions are managed elsewhere and
//! only looked up here.

use crate::error::AccessError;
use crate::storage::ServiceStorage;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const PRESENTATION_DEFINITION_NAMESPACE: &str = "presentation_definition";

#[async_trait]
pub trait PresentationDefinitions: Send + Sync {
    /// Returns the definition with `id`.
    ///
    /// # Errors
    /// Returns [`AccessError::NotFound`] for unknown ids.
    async fn get_presentation_definition(&self, id: &str) -> Result<Value, AccessError>;
}

/// Presentation definitions kept in the service storage as JSON.
#[derive(Clone)]
pub struct StoredPresentationDefinitions {
    db: Arc<dyn ServiceStorage>,
}

impl StoredPresentationDefinitions {
    pub fn new(db: Arc<dyn ServiceStorage>) -> Self {
        Self { db }
    }

    pub async fn store_definition(&self, id: &str, definition: &Value) -> Result<(), AccessError> {
        if id.is_empty() {
            return Err(AccessError::Validation("presentation definition id is required".into()));
        }
        let data = serde_json::to_vec(definition).map_err(crate::storage::StorageError::from)?;
        self.db.write(PRESENTATION_DEFINITION_NAMESPACE, id, data).await?;
        Ok(())
    }
}

#[async_trait]
impl PresentationDefinitions for StoredPresentationDefinitions {
    async fn get_presentation_definition(&self, id: &str) -> Result<Value, AccessError> {
        let data = self
            .db
            .read(PRESENTATION_DEFINITION_NAMESPACE, id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("presentation definition {}", id)))?;
        serde_json::from_slice(&data).map_err(|e| AccessError::Storage(e.into()))
    }
}
