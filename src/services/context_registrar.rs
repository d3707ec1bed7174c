// src/services/context_registrar.rs
//! Access context and resource registration.
//!
//! The service wallet owns one access context, keyed by its DID hash.
//! Resources are registered in that context together with the role that
//! protects them and the policy the role requires.

use crate::blockchain::gateway::{ChainGateway, CreateContextCall, RegisterResourceCall};
use crate::error::AccessError;
use crate::models::context::StoredAccessContext;
use crate::models::identifier::{PolicyIdentifier, RoleIdentifier};
use crate::storage::auth_storage::AuthStorage;
use crate::utils::crypto::hash_str;
use crate::wallet::transaction::FeeRequest;
use crate::wallet::Wallet;
use ethers::utils::to_checksum;
use ethers_core::types::Address;
use log::{debug, info};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Operations granted on a registered resource: read and write.
pub const RESOURCE_OPERATIONS: [u8; 2] = [0, 1];

/// Request of [`ContextRegistrar::register_resource`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisterResourceRequest {
    /// Role protecting the resource
    pub role: String,
    /// Verifier contract of the role's policy
    pub policy_contract: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeRequest>,
}

/// What was registered for a resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RegisterResourceResponse {
    /// `<context hash>+<role hash>`
    pub role: String,
    /// `<context hash>+<policy hash>`
    pub policy: String,
    pub permission: String,
    /// `<wallet DID>;<resource>`
    pub resource: String,
    pub operations: Vec<u8>,
    pub did: String,
    pub registration_tx: String,
}

impl RegisterResourceRequest {
    fn validate(&self) -> Result<Address, AccessError> {
        if self.role.trim().is_empty() || self.resource.trim().is_empty() {
            return Err(AccessError::Validation("role and resource are required".into()));
        }
        self.policy_contract
            .trim()
            .parse()
            .map_err(|e| AccessError::Validation(format!("invalid policy contract {}: {}", self.policy_contract, e)))
    }
}

/// Creates the wallet's access context and registers resources in it.
#[derive(Clone)]
pub struct ContextRegistrar {
    storage: AuthStorage,
    chain: Arc<dyn ChainGateway>,
    wallet: Arc<Wallet>,
}

impl ContextRegistrar {
    pub fn new(storage: AuthStorage, chain: Arc<dyn ChainGateway>, wallet: Arc<Wallet>) -> Self {
        ContextRegistrar { storage, chain, wallet }
    }

    /// Returns the wallet's access context, creating it on-chain when needed.
    ///
    /// The local record is consulted first, then the handler. Only when
    /// neither knows the context is `createContextInstance` submitted with a
    /// random salt; the instance address is read back once it is mined.
    ///
    /// # Errors
    /// - [`AccessError::TransactionSubmission`] when creation fails or is not mined
    /// - [`AccessError::NotFound`] when the handler still has no instance afterwards
    /// - [`AccessError::ChainRpc`] and [`AccessError::Storage`] from lookups
    pub async fn create_access_context(&self) -> Result<StoredAccessContext, AccessError> {
        let id = self.wallet.did_hash();
        let key = format!("{:#x}", id);

        if self.storage.access_context_exists(&key).await? {
            if let Some(stored) = self.storage.get_access_context(&key).await? {
                debug!("access context {} already stored", key);
                return Ok(stored);
            }
        }

        let address = match self.chain.context_address(id).await? {
            Some(address) => address,
            None => {
                let call = CreateContextCall {
                    id,
                    salt: random_salt()?,
                    did: self.wallet.did_hash(),
                };
                let chain = self.chain.clone();
                let tx = self
                    .wallet
                    .submit(self.chain.as_ref(), None, |opts| async move {
                        chain.create_context(call, &opts).await
                    })
                    .await?;
                self.chain.wait_mined(tx).await?;
                let address = self
                    .chain
                    .context_address(id)
                    .await?
                    .ok_or_else(|| AccessError::NotFound(format!("access context {}", key)))?;
                info!("created access context {} at {:?}", key, address);
                address
            }
        };

        let stored = StoredAccessContext {
            id: key.clone(),
            address: to_checksum(&address, None),
        };
        self.storage.insert_access_context(&stored).await?;
        Ok(self.storage.get_access_context(&key).await?.unwrap_or(stored))
    }

    /// Registers `resource` in the wallet's access context, protected by
    /// `role` which requires a fresh policy checked by `policy_contract`.
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] for incomplete requests before any
    /// chain call, and [`AccessError::TransactionSubmission`] when the
    /// registration is rejected.
    pub async fn register_resource(&self, request: RegisterResourceRequest) -> Result<RegisterResourceResponse, AccessError> {
        let verifier = request.validate()?;

        let did = self.wallet.did();
        let role = RoleIdentifier::new(did, &request.role);
        let policy = PolicyIdentifier::new(did, &Uuid::new_v4().to_string());
        let permission = Uuid::new_v4().to_string();
        let resource = format!("{};{}", did, request.resource);

        let call = RegisterResourceCall {
            context: self.wallet.did_hash(),
            role: role.role_id,
            policy: policy.policy_id,
            permission: hash_str(&permission),
            resource: hash_str(&resource),
            operations: RESOURCE_OPERATIONS.to_vec(),
            verifier,
            did: self.wallet.did_hash(),
        };
        let chain = self.chain.clone();
        let tx = self
            .wallet
            .submit(self.chain.as_ref(), request.fee, |opts| async move {
                chain.register_resource(call, &opts).await
            })
            .await?;
        info!("registered resource {} for role {}", resource, role);

        Ok(RegisterResourceResponse {
            role: role.to_string(),
            policy: policy.to_string(),
            permission,
            resource,
            operations: RESOURCE_OPERATIONS.to_vec(),
            did: did.to_string(),
            registration_tx: format!("{:#x}", tx),
        })
    }
}

fn random_salt() -> Result<[u8; 20], AccessError> {
    let mut salt = [0u8; 20];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| AccessError::TransactionSubmission("could not generate context salt".into()))?;
    Ok(salt)
}
