// src/blockchain/gateway.rs
//! Contract-facing operations consumed by the access-control services.
//!
//! Every identifier crossing this boundary is already hashed (`bytes32`);
//! callers hash context ids, role ids, session ids and DIDs with keccak256.

use crate::error::AccessError;
use crate::models::proof::{Proof, PublicInputs};
use crate::wallet::transaction::TxOptions;
use async_trait::async_trait;
use ethers_core::types::{Address, H256, U256};

/// Arguments of `AccessContext.grantRole`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantRoleCall {
    /// Access context the role lives in, selects the contract instance
    pub context: H256,
    pub role: H256,
    /// Hash of the DID the role is granted to
    pub did: H256,
    pub policy_contexts: Vec<H256>,
    pub policies: Vec<H256>,
    pub proofs: Vec<Proof>,
    pub inputs: Vec<PublicInputs>,
}

/// Arguments of `AccessContext.registerPolicy`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterPolicyCall {
    pub context: H256,
    pub policy: H256,
    pub verifier: Address,
    pub did: H256,
}

/// Arguments of `AccessContextHandler.createContextInstance`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateContextCall {
    pub id: H256,
    /// Salt of the instance's deterministic address
    pub salt: [u8; 20],
    /// Hash of the DID owning the new context
    pub did: H256,
}

/// Arguments of `AccessContext.setupRole`: a resource protected by a role
/// whose policy is checked by `verifier`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterResourceCall {
    pub context: H256,
    pub role: H256,
    pub policy: H256,
    pub permission: H256,
    pub resource: H256,
    pub operations: Vec<u8>,
    pub verifier: Address,
    pub did: H256,
}

/// A transaction included in a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinedTransaction {
    pub tx_hash: H256,
    /// Address of the contract the transaction created, if any
    pub contract_address: Option<Address>,
}

/// Chain access used by session verification, role granting and policy publication.
///
/// Reads fail with [`AccessError::ChainRpc`] or [`AccessError::NotFound`];
/// submissions fail with [`AccessError::TransactionSubmission`]. Submissions
/// return once the node accepted the transaction, without waiting for it to
/// be mined.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<U256, AccessError>;

    /// Suggested legacy gas price.
    async fn gas_price(&self) -> Result<U256, AccessError>;

    /// Whether a session with `session` id hash exists for the verifier `did` hash.
    async fn is_session(&self, session: H256, did: H256) -> Result<bool, AccessError>;

    /// Address of the access-context instance registered under `context`, `None` when absent.
    async fn context_address(&self, context: H256) -> Result<Option<Address>, AccessError>;

    /// Whether `did` holds `role` in access context `context`.
    async fn has_role(&self, context: H256, role: H256, did: H256) -> Result<bool, AccessError>;

    async fn grant_role(&self, call: GrantRoleCall, opts: &TxOptions) -> Result<H256, AccessError>;

    /// Whether a policy contract can be deployed by this gateway.
    fn can_deploy_policy(&self) -> bool;

    /// Sends the deployment of a policy contract referencing the published artifact URIs.
    ///
    /// Returns the deployment transaction hash; see [`ChainGateway::wait_mined`]
    /// for the contract address.
    async fn send_policy_deployment(&self, uris: &[String], opts: &TxOptions) -> Result<H256, AccessError>;

    async fn register_policy(&self, call: RegisterPolicyCall, opts: &TxOptions) -> Result<H256, AccessError>;

    async fn create_context(&self, call: CreateContextCall, opts: &TxOptions) -> Result<H256, AccessError>;

    async fn register_resource(&self, call: RegisterResourceCall, opts: &TxOptions) -> Result<H256, AccessError>;

    /// Waits until `tx` is mined.
    ///
    /// Fails with [`AccessError::TransactionSubmission`] when the transaction
    /// reverted, was dropped or is not mined within the RPC timeout.
    async fn wait_mined(&self, tx: H256) -> Result<MinedTransaction, AccessError>;
}
