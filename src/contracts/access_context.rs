// src/contracts/access_context.rs
//! AccessContextHandler and AccessContext contract bindings.
//!
//! The handler is the single entry point configured for the service; it maps
//! an access-context id hash to the address of that context's instance, and
//! answers session-existence queries. Roles and policies live in the instances.

use super::{bytes32, bytes32_array, load_abi};
use crate::blockchain::gateway::{CreateContextCall, GrantRoleCall, RegisterPolicyCall, RegisterResourceCall};
use crate::error::AccessError;
use crate::models::proof::{Proof, PublicInputs};
use crate::wallet::transaction::TxOptions;
use ethers_contract::Contract;
use ethers::providers::Middleware;
use ethers_core::abi::{Detokenize, Token, Tokenize};
use ethers_core::types::{Address, H256};
use std::sync::Arc;

/// Sends a prepared state-changing call with the wallet's options.
///
/// Returns once the node accepted the transaction.
async fn send<M: Middleware + 'static>(
    contract: &Contract<M>,
    method: &str,
    args: impl Tokenize,
    opts: &TxOptions,
) -> Result<H256, AccessError> {
    let submission_error = |e: String| AccessError::TransactionSubmission(format!("{}: {}", method, e));

    let mut call = contract
        .method::<_, ()>(method, args)
        .map_err(|e| submission_error(e.to_string()))?;
    if opts.is_legacy() {
        call = call.legacy();
    }
    opts.apply(&mut call.tx);

    let pending = call.send().await.map_err(|e| submission_error(e.to_string()))?;
    Ok(pending.tx_hash())
}

async fn query<M: Middleware + 'static, R: Detokenize>(
    contract: &Contract<M>,
    method: &str,
    args: impl Tokenize,
) -> Result<R, AccessError> {
    contract
        .method::<_, R>(method, args)
        .map_err(|e| AccessError::ChainRpc(format!("{}: {}", method, e)))?
        .call()
        .await
        .map_err(|e| AccessError::ChainRpc(format!("{}: {}", method, e)))
}

/// Binding of the AccessContextHandler contract.
pub struct AccessContextHandler<M> {
    contract: Contract<M>,
}

impl<M: Middleware + 'static> AccessContextHandler<M> {
    pub fn new(address: Address, client: Arc<M>) -> Result<Self, AccessError> {
        let abi = load_abi("AccessContextHandler", include_bytes!("../abi/AccessContextHandler.json"))?;
        Ok(AccessContextHandler {
            contract: Contract::new(address, abi, client),
        })
    }

    /// Address registered under `context`; the zero address reads as `None`.
    pub async fn context_address(&self, context: H256) -> Result<Option<Address>, AccessError> {
        let address: Address = query(&self.contract, "getContextInstance", (bytes32(context),)).await?;
        Ok((!address.is_zero()).then_some(address))
    }

    /// Address of the access-context instance registered under `context`.
    ///
    /// # Errors
    /// Returns [`AccessError::NotFound`] when no instance is registered (zero address).
    pub async fn context_instance(&self, context: H256) -> Result<Address, AccessError> {
        self.context_address(context)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("access context {:#x}", context)))
    }

    /// Submits `createContextInstance(id, salt, did)`.
    pub async fn create_context_instance(&self, call: &CreateContextCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let args = (bytes32(call.id), Token::FixedBytes(call.salt.to_vec()), bytes32(call.did));
        send(&self.contract, "createContextInstance", args, opts).await
    }

    /// Checks `isSession(id, did)`.
    pub async fn is_session(&self, session: H256, did: H256) -> Result<bool, AccessError> {
        query(&self.contract, "isSession", (bytes32(session), bytes32(did))).await
    }
}

/// Binding of one AccessContext instance.
pub struct AccessContext<M> {
    contract: Contract<M>,
}

impl<M: Middleware + 'static> AccessContext<M> {
    pub fn new(address: Address, client: Arc<M>) -> Result<Self, AccessError> {
        let abi = load_abi("AccessContext", include_bytes!("../abi/AccessContext.json"))?;
        Ok(AccessContext {
            contract: Contract::new(address, abi, client),
        })
    }

    pub async fn has_role(&self, role: H256, did: H256) -> Result<bool, AccessError> {
        query(&self.contract, "hasRole", (bytes32(role), bytes32(did))).await
    }

    /// Submits `grantRole`; the contract verifies every proof against its policy.
    ///
    /// # Arguments
    /// * `call` - Role, grantee and one proof with inputs per policy
    /// * `opts` - Nonce, gas and fee prepared by the wallet
    ///
    /// # Returns
    /// Hash of the accepted transaction
    pub async fn grant_role(&self, call: &GrantRoleCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let args = (
            bytes32(call.role),
            bytes32(call.did),
            bytes32_array(&call.policy_contexts),
            bytes32_array(&call.policies),
            Token::Array(call.proofs.iter().map(Proof::to_token).collect()),
            Token::Array(call.inputs.iter().map(PublicInputs::to_token).collect()),
        );
        send(&self.contract, "grantRole", args, opts).await
    }

    pub async fn register_policy(&self, call: &RegisterPolicyCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let args = (bytes32(call.policy), Token::Address(call.verifier), bytes32(call.did));
        send(&self.contract, "registerPolicy", args, opts).await
    }

    /// Submits `setupRole`: registers the policy, the permission on the
    /// resource and the role requiring both in one transaction.
    pub async fn setup_role(&self, call: &RegisterResourceCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let args = (
            bytes32(call.role),
            bytes32(call.policy),
            bytes32(call.permission),
            bytes32(call.resource),
            Token::Array(call.operations.iter().map(|op| Token::Uint((*op).into())).collect()),
            Token::Address(call.verifier),
            bytes32(call.did),
        );
        send(&self.contract, "setupRole", args, opts).await
    }
}
