// src/services/did_resolver.rs
//! DID resolution collaborator.
//!
//! Resolution is delegated: documents either come from a preconfigured set or
//! from the on-chain DID registry. [`FallbackResolver`] asks every source at
//! once and takes the first document found.

use crate::contracts::did_registry::DIDRegistry;
use crate::error::AccessError;
use crate::models::did::DIDDocument;
use crate::utils::first_success::first_success;
use async_trait::async_trait;
use ethers::providers::Middleware;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves a DID to its document.
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DIDDocument, AccessError>;
}

/// Resolver over a fixed set of documents.
#[derive(Default)]
pub struct StaticResolver {
    documents: RwLock<HashMap<String, DIDDocument>>,
}

impl StaticResolver {
    pub fn new(documents: Vec<DIDDocument>) -> Self {
        StaticResolver {
            documents: RwLock::new(documents.into_iter().map(|d| (d.id.clone(), d)).collect()),
        }
    }

    /// Reads a JSON array of DID documents.
    pub fn from_file(path: &str) -> Result<Self, AccessError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AccessError::Validation(format!("could not read DID documents {}: {}", path, e)))?;
        let documents: Vec<DIDDocument> = serde_json::from_str(&json)
            .map_err(|e| AccessError::Validation(format!("invalid DID documents {}: {}", path, e)))?;
        Ok(Self::new(documents))
    }

    pub async fn insert(&self, document: DIDDocument) {
        self.documents.write().await.insert(document.id.clone(), document);
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> Result<DIDDocument, AccessError> {
        self.documents
            .read()
            .await
            .get(did)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(format!("DID document of {}", did)))
    }
}

/// Resolver backed by the DID registry contract.
pub struct RegistryResolver<M> {
    registry: DIDRegistry<M>,
}

impl<M> RegistryResolver<M> {
    pub fn new(registry: DIDRegistry<M>) -> Self {
        RegistryResolver { registry }
    }
}

#[async_trait]
impl<M: Middleware + 'static> DidResolver for RegistryResolver<M> {
    async fn resolve(&self, did: &str) -> Result<DIDDocument, AccessError> {
        self.registry.resolve_did(did).await
    }
}

/// Asks every resolver concurrently; the first document wins.
pub struct FallbackResolver {
    resolvers: Vec<Arc<dyn DidResolver>>,
}

impl FallbackResolver {
    pub fn new(resolvers: Vec<Arc<dyn DidResolver>>) -> Self {
        FallbackResolver { resolvers }
    }
}

#[async_trait]
impl DidResolver for FallbackResolver {
    async fn resolve(&self, did: &str) -> Result<DIDDocument, AccessError> {
        let lookups: Vec<BoxFuture<'static, Result<DIDDocument, AccessError>>> = self
            .resolvers
            .iter()
            .map(|resolver| {
                let resolver = resolver.clone();
                let did = did.to_string();
                Box::pin(async move { resolver.resolve(&did).await }) as BoxFuture<'static, _>
            })
            .collect();

        first_success(lookups).await.map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            AccessError::NotFound(format!("DID document of {} ({})", did, reasons.join("; ")))
        })
    }
}
