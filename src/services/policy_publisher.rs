// src/services/policy_publisher.rs
//! Policy publication.
//!
//! A policy binds a presentation definition to a proof verifier. Publishing one:
//! 1. publishes the presentation definition, proof program, proving key and
//!    verification key to the artifact store
//! 2. deploys a policy contract for the artifact set, or takes the verifier
//!    contract given in the request
//! 3. registers the contract under the policy id in the access context
//!
//! Deployments are remembered by a key derived from the verifier and the
//! artifact URIs, so publishing the same artifacts again reuses the contract.

use crate::blockchain::gateway::{ChainGateway, RegisterPolicyCall};
use crate::error::AccessError;
use crate::models::identifier::PolicyIdentifier;
use crate::models::policy::{CreatePolicyResponse, PolicyURISet};
use crate::services::presentation::PresentationDefinitions;
use crate::storage::auth_storage::AuthStorage;
use crate::storage::ipfs_client::ArtifactStore;
use crate::storage::StorageError;
use crate::utils::crypto::hash_data;
use crate::wallet::transaction::FeeRequest;
use crate::wallet::Wallet;
use ethers::utils::to_checksum;
use ethers_core::types::Address;
use ethers_core::utils::hex;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Verifier material of a policy; binary artifacts are base64 encoded.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PolicyVerifier {
    /// Already deployed verifier contract; a policy contract is deployed when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub proof_program: String,
    pub proving_key: String,
    pub verification_key: String,
}

/// Request of [`PolicyPublisher::create_policy`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CreatePolicyRequest {
    pub presentation_definition_id: String,
    pub policy_id: String,
    /// Access context to register in; the service wallet's DID when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub verifier: PolicyVerifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeRequest>,
}

/// Decoded verifier artifacts.
struct VerifierArtifacts {
    contract: Option<Address>,
    proof_program: Vec<u8>,
    proving_key: Vec<u8>,
    verification_key: Vec<u8>,
}

fn decode_artifact(name: &str, encoded: &str) -> Result<Vec<u8>, AccessError> {
    let bytes = base64::decode(encoded.trim())
        .map_err(|e| AccessError::Validation(format!("{} is not valid base64: {}", name, e)))?;
    if bytes.is_empty() {
        return Err(AccessError::Validation(format!("{} is required", name)));
    }
    Ok(bytes)
}

impl CreatePolicyRequest {
    fn validate(&self) -> Result<VerifierArtifacts, AccessError> {
        if self.presentation_definition_id.trim().is_empty() || self.policy_id.trim().is_empty() {
            return Err(AccessError::Validation(
                "presentation definition id and policy id are required".into(),
            ));
        }
        let contract = match self.verifier.contract_address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Some(
                address
                    .parse::<Address>()
                    .map_err(|e| AccessError::Validation(format!("invalid verifier address {}: {}", address, e)))?,
            ),
            _ => None,
        };
        Ok(VerifierArtifacts {
            contract,
            proof_program: decode_artifact("proof program", &self.verifier.proof_program)?,
            proving_key: decode_artifact("proving key", &self.verifier.proving_key)?,
            verification_key: decode_artifact("verification key", &self.verifier.verification_key)?,
        })
    }
}

/// Key under which the contract deployed for an artifact set is remembered.
pub fn deployment_key(verifier: Option<Address>, uris: &PolicyURISet) -> Result<String, AccessError> {
    let mut preimage = verifier.map(|a| a.as_bytes().to_vec()).unwrap_or_default();
    preimage.extend(serde_json::to_vec(uris).map_err(StorageError::from)?);
    Ok(hex::encode(hash_data(&preimage)))
}

/// Publishes policies and registers them on-chain.
#[derive(Clone)]
pub struct PolicyPublisher {
    storage: AuthStorage,
    artifacts: Arc<dyn ArtifactStore>,
    presentation: Arc<dyn PresentationDefinitions>,
    chain: Arc<dyn ChainGateway>,
    wallet: Arc<Wallet>,
}

impl PolicyPublisher {
    pub fn new(
        storage: AuthStorage,
        artifacts: Arc<dyn ArtifactStore>,
        presentation: Arc<dyn PresentationDefinitions>,
        chain: Arc<dyn ChainGateway>,
        wallet: Arc<Wallet>,
    ) -> Self {
        PolicyPublisher {
            storage,
            artifacts,
            presentation,
            chain,
            wallet,
        }
    }

    /// Publishes the policy artifacts, deploys and registers the policy contract.
    ///
    /// # Returns
    /// The registered contract, the artifact URIs and the registration transaction hash
    ///
    /// # Errors
    /// - [`AccessError::Validation`] for incomplete requests, or when no verifier
    ///   address is given and no policy contract can be deployed
    /// - [`AccessError::NotFound`] for unknown presentation definitions
    /// - [`AccessError::ArtifactStore`] when publishing fails
    /// - [`AccessError::TransactionSubmission`] when deployment or registration fails
    pub async fn create_policy(&self, request: CreatePolicyRequest) -> Result<CreatePolicyResponse, AccessError> {
        let verifier = request.validate()?;
        if verifier.contract.is_none() && !self.chain.can_deploy_policy() {
            return Err(AccessError::Validation(
                "verifier contract address is required when no policy contract artifact is configured".into(),
            ));
        }

        let definition = self
            .presentation
            .get_presentation_definition(&request.presentation_definition_id)
            .await?;
        let definition = serde_json::to_vec(&definition).map_err(StorageError::from)?;

        let uris = self.publish_artifacts(definition, verifier.proof_program, verifier.proving_key, verifier.verification_key).await?;
        let contract = self.policy_contract(verifier.contract, &uris, request.fee).await?;

        let context = request
            .context_id
            .as_deref()
            .filter(|context| !context.is_empty())
            .unwrap_or_else(|| self.wallet.did());
        let identifier = PolicyIdentifier::new(context, &request.policy_id);
        let call = RegisterPolicyCall {
            context: identifier.context_id,
            policy: identifier.policy_id,
            verifier: contract,
            did: self.wallet.did_hash(),
        };

        let chain = self.chain.clone();
        let registration_tx = self
            .wallet
            .submit(self.chain.as_ref(), request.fee, |opts| async move {
                chain.register_policy(call, &opts).await
            })
            .await?;
        info!("registered policy {} with contract {:?}", identifier, contract);

        Ok(CreatePolicyResponse {
            policy_contract: to_checksum(&contract, None),
            uris,
            registration_tx: format!("{:#x}", registration_tx),
        })
    }

    async fn publish_artifacts(
        &self,
        definition: Vec<u8>,
        proof_program: Vec<u8>,
        proving_key: Vec<u8>,
        verification_key: Vec<u8>,
    ) -> Result<PolicyURISet, AccessError> {
        let (presentation_definition, proof_program, proving_key, verification_key) = futures::try_join!(
            self.artifacts.publish("presentation definition", definition),
            self.artifacts.publish("proof program", proof_program),
            self.artifacts.publish("proving key", proving_key),
            self.artifacts.publish("verification key", verification_key),
        )?;
        Ok(PolicyURISet {
            presentation_definition,
            proof_program,
            proving_key,
            verification_key,
        })
    }

    /// Contract to register: a remembered deployment, the given verifier, or a new deployment.
    async fn policy_contract(
        &self,
        verifier: Option<Address>,
        uris: &PolicyURISet,
        fee: Option<FeeRequest>,
    ) -> Result<Address, AccessError> {
        let key = deployment_key(verifier, uris)?;
        if let Some(known) = self.storage.get_policy_contract(&key).await? {
            info!("reusing policy contract {} for deployment {}", known, key);
            return known
                .parse()
                .map_err(|e| AccessError::Storage(StorageError::InvalidRecord(format!("policy contract {}: {}", known, e))));
        }

        let contract = match verifier {
            Some(address) => address,
            None => {
                let chain = self.chain.clone();
                let uri_list = vec![
                    uris.presentation_definition.clone(),
                    uris.proof_program.clone(),
                    uris.proving_key.clone(),
                    uris.verification_key.clone(),
                ];
                let tx = self
                    .wallet
                    .submit(self.chain.as_ref(), fee, |opts| async move {
                        chain.send_policy_deployment(&uri_list, &opts).await
                    })
                    .await?;
                // the receipt is awaited after the submission lock is released
                let mined = self.chain.wait_mined(tx).await?;
                let address = mined.contract_address.ok_or_else(|| {
                    AccessError::TransactionSubmission(format!("deployment {:?} created no contract", tx))
                })?;
                info!("deployed policy contract at {:?}", address);
                address
            }
        };
        self.storage
            .record_policy_contract(&key, &to_checksum(&contract, None))
            .await?;
        Ok(contract)
    }
}
