// src/services/role_granter.rs
//! Proof-gated role granting.
//!
//! The service submits `grantRole` with one zero-knowledge proof per policy;
//! the access-context contract verifies the proofs. A role is cached locally
//! only after the node accepted the transaction.

use crate::blockchain::gateway::{ChainGateway, GrantRoleCall};
use crate::error::AccessError;
use crate::models::identifier::{PolicyIdentifier, RoleIdentifier};
use crate::models::proof::{Proof, PublicInputs};
use crate::models::session::Role;
use crate::storage::auth_storage::AuthStorage;
use crate::utils::crypto::hash_str;
use crate::wallet::transaction::FeeRequest;
use crate::wallet::Wallet;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A proof satisfying one policy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PolicyProof {
    pub context_id: String,
    pub policy_id: String,
    pub proof: Proof,
    pub inputs: PublicInputs,
}

/// Request of [`RoleGranter::grant_role`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GrantRoleRequest {
    pub role_id: String,
    pub context_id: String,
    /// DID receiving the role; the service wallet's DID when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub policies: Vec<PolicyProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeRequest>,
}

impl GrantRoleRequest {
    fn validate(&self) -> Result<(), AccessError> {
        if self.role_id.trim().is_empty() || self.context_id.trim().is_empty() {
            return Err(AccessError::Validation("role id and context id are required".into()));
        }
        if self.policies.is_empty() {
            return Err(AccessError::Validation(format!("no policy proofs for role {}", self.role_id)));
        }
        if let Some(policy) = self
            .policies
            .iter()
            .find(|p| p.context_id.trim().is_empty() || p.policy_id.trim().is_empty())
        {
            return Err(AccessError::Validation(format!(
                "incomplete policy reference <{}+{}>",
                policy.context_id, policy.policy_id
            )));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GrantRoleResponse {
    pub role: Role,
    /// Hash of the accepted `grantRole` transaction
    pub tx_hash: String,
}

/// Grants roles on-chain on behalf of the service wallet.
#[derive(Clone)]
pub struct RoleGranter {
    storage: AuthStorage,
    chain: Arc<dyn ChainGateway>,
    wallet: Arc<Wallet>,
}

impl RoleGranter {
    pub fn new(storage: AuthStorage, chain: Arc<dyn ChainGateway>, wallet: Arc<Wallet>) -> Self {
        RoleGranter { storage, chain, wallet }
    }

    /// Submits a proof-gated role grant and caches the role.
    ///
    /// # Arguments
    /// * `request` - Role, context, optional grantee and one proof per policy
    ///
    /// # Returns
    /// The cached role and the transaction hash
    ///
    /// # Errors
    /// - [`AccessError::Validation`] for incomplete requests, before any chain call
    /// - [`AccessError::TransactionSubmission`] when nonce, gas or submission fail
    /// - [`AccessError::Storage`] when the accepted grant could not be cached
    ///
    /// No role is cached when the submission fails, and failures are not retried.
    pub async fn grant_role(&self, request: GrantRoleRequest) -> Result<GrantRoleResponse, AccessError> {
        request.validate()?;

        let identifier = RoleIdentifier::new(&request.context_id, &request.role_id);
        let grantee = request
            .subject
            .as_deref()
            .filter(|subject| !subject.is_empty())
            .unwrap_or_else(|| self.wallet.did());

        let policies: Vec<PolicyIdentifier> = request
            .policies
            .iter()
            .map(|p| PolicyIdentifier::new(&p.context_id, &p.policy_id))
            .collect();
        let call = GrantRoleCall {
            context: identifier.context_id,
            role: identifier.role_id,
            did: hash_str(grantee),
            policy_contexts: policies.iter().map(|p| p.context_id).collect(),
            policies: policies.iter().map(|p| p.policy_id).collect(),
            proofs: request.policies.iter().map(|p| p.proof).collect(),
            inputs: request.policies.iter().map(|p| p.inputs).collect(),
        };

        let chain = self.chain.clone();
        let tx_hash = self
            .wallet
            .submit(self.chain.as_ref(), request.fee, |opts| async move {
                chain.grant_role(call, &opts).await
            })
            .await?;
        info!("granted role {} to {} in tx {:#x}", identifier, grantee, tx_hash);

        let role = Role {
            id: request.role_id,
            context: request.context_id,
            identifier: Some(identifier.to_string()),
        };
        self.storage.insert_role(&role).await?;

        Ok(GrantRoleResponse {
            role,
            tx_hash: format!("{:#x}", tx_hash),
        })
    }

    /// Cached role by role id.
    pub async fn get_role(&self, role_id: &str) -> Result<Role, AccessError> {
        self.storage
            .get_role(role_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("role {}", role_id)))
    }
}
