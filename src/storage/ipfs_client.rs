// src/storage/ipfs_client.rs
//! Content-addressed publication of policy artifacts.
//!
//! Policy artifacts (presentation definition, proof program, proving key,
//! verification key) are published to IPFS and referenced by `ipfs://<cid>`
//! URIs. Everything published here is public.

use async_trait::async_trait;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use log::debug;
use std::io::Cursor;
use std::sync::Arc;
use tokio::task;

use crate::error::AccessError;

/// Store for immutable, publicly addressable artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Publishes `data` and returns its URI.
    ///
    /// # Arguments
    /// * `name` - Human readable artifact name, used for logging only
    /// * `data` - Raw artifact bytes
    async fn publish(&self, name: &str, data: Vec<u8>) -> Result<String, AccessError>;
}

/// IPFS artifact store backed by an IPFS node's HTTP API.
#[derive(Clone)]
pub struct IpfsStorage {
    client: Arc<IpfsClient>,
}

impl IpfsStorage {
    /// Creates a client for the IPFS node at `api_url`, e.g. `http://localhost:5001`.
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] if the URL is not a valid URI.
    pub fn new(api_url: &str) -> Result<Self, AccessError> {
        let client = IpfsClient::from_str(api_url)
            .map_err(|e| AccessError::Validation(format!("invalid IPFS API url {}: {}", api_url, e)))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
        })
    }

    /// Adds raw bytes to IPFS and returns the CID.
    ///
    /// The hyper backend's futures are not `Send`, so the request is driven on a
    /// dedicated current-thread runtime inside a blocking task.
    pub async fn store_data(&self, data: Vec<u8>) -> Result<String, AccessError> {
        let client = self.client.clone();

        let added = task::spawn_blocking(move || -> Result<String, String> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())?;
            rt.block_on(async {
                client
                    .add(Cursor::new(data))
                    .await
                    .map(|res| res.hash)
                    .map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e| AccessError::ArtifactStore(e.to_string()))?;

        added.map_err(AccessError::ArtifactStore)
    }
}

#[async_trait]
impl ArtifactStore for IpfsStorage {
    async fn publish(&self, name: &str, data: Vec<u8>) -> Result<String, AccessError> {
        let size = data.len();
        let cid = self.store_data(data).await?;
        debug!("published {} ({} bytes) as {}", name, size, cid);
        Ok(format!("ipfs://{}", cid))
    }
}
