// src/contracts/did_registry.rs
//! DID Registry smart contract interface.
//!
//! Only resolution is used: the registry returns the DID document of a DID as
//! a JSON string.

use super::load_abi;
use crate::error::AccessError;
use crate::models::did::DIDDocument;
use ethers_contract::Contract;
use ethers::providers::Middleware;
use ethers_core::types::Address;
use std::sync::Arc;

/// DID Registry smart contract interface.
///
/// # Type Parameters
/// * `M` - Middleware used for read-only calls
pub struct DIDRegistry<M> {
    /// Underlying contract instance
    contract: Contract<M>,
}

impl<M: Middleware + 'static> DIDRegistry<M> {
    /// Creates a new DIDRegistry instance.
    ///
    /// # Arguments
    /// * `client` - Middleware instance
    /// * `contract_address` - Address of deployed DIDRegistry contract
    pub fn new(client: Arc<M>, contract_address: Address) -> Result<Self, AccessError> {
        let abi = load_abi("DIDRegistry", include_bytes!("../abi/DIDRegistry.json"))?;
        Ok(DIDRegistry {
            contract: Contract::new(contract_address, abi, client),
        })
    }

    /// Resolves a DID to its current DID Document.
    ///
    /// # Arguments
    /// * `did` - DID string identifier to resolve
    ///
    /// # Returns
    /// Current DID Document associated with the DID
    ///
    /// # Errors
    /// Returns [`AccessError::ChainRpc`] if the call fails, and
    /// [`AccessError::NotFound`] if the registry has no document for the DID.
    pub async fn resolve_did(&self, did: &str) -> Result<DIDDocument, AccessError> {
        let document_json: String = self
            .contract
            .method::<_, String>("resolveDID", (did.to_string(),))
            .map_err(|e| AccessError::ChainRpc(format!("resolveDID: {}", e)))?
            .call()
            .await
            .map_err(|e| AccessError::ChainRpc(format!("resolveDID: {}", e)))?;

        if document_json.is_empty() {
            return Err(AccessError::NotFound(format!("DID document of {}", did)));
        }
        serde_json::from_str(&document_json)
            .map_err(|e| AccessError::ChainRpc(format!("invalid DID document for {}: {}", did, e)))
    }
}
