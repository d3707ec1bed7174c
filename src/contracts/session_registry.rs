// src/contracts/session_registry.rs
//! SessionRegistry contract binding.

use super::{bytes32, load_abi};
use crate::error::AccessError;
use ethers_contract::Contract;
use ethers::providers::Middleware;
use ethers_core::types::{Address, H256};
use std::sync::Arc;

/// Registry of sessions started on-chain.
pub struct SessionRegistry<M> {
    contract: Contract<M>,
}

impl<M: Middleware + 'static> SessionRegistry<M> {
    pub fn new(address: Address, client: Arc<M>) -> Result<Self, AccessError> {
        let abi = load_abi("SessionRegistry", include_bytes!("../abi/SessionRegistry.json"))?;
        Ok(SessionRegistry {
            contract: Contract::new(address, abi, client),
        })
    }

    /// Whether the session with id hash `session` exists and is still valid.
    pub async fn is_session_valid(&self, session: H256) -> Result<bool, AccessError> {
        self.contract
            .method::<_, bool>("isSessionValid", (bytes32(session),))
            .map_err(|e| AccessError::ChainRpc(format!("isSessionValid: {}", e)))?
            .call()
            .await
            .map_err(|e| AccessError::ChainRpc(format!("isSessionValid: {}", e)))
    }
}
