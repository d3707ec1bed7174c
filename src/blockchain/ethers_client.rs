// src/blockchain/ethers_client.rs
//! [`ChainGateway`] over an Ethereum JSON-RPC endpoint.
//!
//! One signing client (provider + wallet signer) is shared by every binding.
//! Reads, submissions and receipt waits are all bounded by the configured RPC
//! timeout. Submissions return once the node accepted the transaction.

use crate::blockchain::gateway::{
    ChainGateway, CreateContextCall, GrantRoleCall, MinedTransaction, RegisterPolicyCall, RegisterResourceCall,
};
use crate::config::Settings;
use crate::contracts::access_context::{AccessContext, AccessContextHandler};
use crate::contracts::did_registry::DIDRegistry;
use crate::contracts::session_registry::SessionRegistry;
use crate::error::AccessError;
use crate::wallet::transaction::TxOptions;
use crate::wallet::Wallet;
use async_trait::async_trait;
use ethers_contract::ContractFactory;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::LocalWallet;
use ethers_core::abi::{Abi, ParamType, Token};
use ethers_core::types::{Address, BlockNumber, Bytes, H256, U256, U64};
use log::{debug, info};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Provider with the service wallet attached as signer.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Compiled policy contract as emitted by hardhat (`artifacts/**/<Name>.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl PolicyArtifact {
    /// Reads an artifact file.
    pub fn load(path: &str) -> Result<Self, AccessError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AccessError::Validation(format!("could not read policy artifact {}: {}", path, e)))?;
        serde_json::from_str(&json)
            .map_err(|e| AccessError::Validation(format!("invalid policy artifact {}: {}", path, e)))
    }

    /// Constructor arguments for a deployment referencing `uris`.
    ///
    /// A constructor without inputs gets none; a constructor taking one string
    /// per artifact URI gets the URIs in order.
    pub fn constructor_args(&self, uris: &[String]) -> Result<Vec<Token>, AccessError> {
        let inputs = self.abi.constructor().map(|c| c.inputs.as_slice()).unwrap_or_default();
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if inputs.len() == uris.len() && inputs.iter().all(|p| p.kind == ParamType::String) {
            return Ok(uris.iter().cloned().map(Token::String).collect());
        }
        Err(AccessError::Validation(format!(
            "policy contract constructor takes {} arguments, expected none or {} strings",
            inputs.len(),
            uris.len()
        )))
    }
}

/// Chain gateway backed by `ethers`.
pub struct EthersGateway {
    client: Arc<SignerClient>,
    handler: AccessContextHandler<SignerClient>,
    session_registry: Option<SessionRegistry<SignerClient>>,
    policy_artifact: Option<PolicyArtifact>,
    rpc_timeout: Duration,
}

fn parse_address(name: &str, value: &str) -> Result<Address, AccessError> {
    value
        .trim()
        .parse()
        .map_err(|e| AccessError::Validation(format!("invalid {} {}: {}", name, value, e)))
}

impl EthersGateway {
    /// Connects the gateway to the configured chain.
    ///
    /// # Arguments
    /// * `settings` - RPC URL, contract addresses, timeout and policy artifact
    /// * `wallet` - Service wallet whose signer is attached to the client
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] on malformed URLs, addresses or artifact.
    pub fn new(settings: &Settings, wallet: &Wallet) -> Result<Self, AccessError> {
        let provider = Provider::<Http>::try_from(settings.rpc_url.as_str())
            .map_err(|e| AccessError::Validation(format!("invalid RPC url {}: {}", settings.rpc_url, e)))?;
        let client = Arc::new(SignerMiddleware::new(provider, wallet.signer()));

        let handler_address = parse_address("access context handler address", &settings.access_context_handler_address)?;
        let handler = AccessContextHandler::new(handler_address, client.clone())?;

        let session_registry = match settings.session_registry_address.as_deref() {
            Some(address) if !address.trim().is_empty() => Some(SessionRegistry::new(
                parse_address("session registry address", address)?,
                client.clone(),
            )?),
            _ => None,
        };

        let policy_artifact = match settings.policy_artifact_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(PolicyArtifact::load(path)?),
            _ => None,
        };

        info!(
            "chain gateway on chain {} via {} (session check: {})",
            wallet.chain_id(),
            settings.rpc_url,
            if session_registry.is_some() { "SessionRegistry" } else { "AccessContextHandler" }
        );

        Ok(EthersGateway {
            client,
            handler,
            session_registry,
            policy_artifact,
            rpc_timeout: settings.rpc_timeout(),
        })
    }

    /// DID registry binding sharing this gateway's client.
    pub fn did_registry(&self, address: &str) -> Result<DIDRegistry<SignerClient>, AccessError> {
        DIDRegistry::new(self.client.clone(), parse_address("DID registry address", address)?)
    }

    async fn bounded<T, F>(&self, what: &str, error: fn(String) -> AccessError, fut: F) -> Result<T, AccessError>
    where
        F: Future<Output = Result<T, AccessError>>,
    {
        match timeout(self.rpc_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(error(format!("{} timed out after {:?}", what, self.rpc_timeout))),
        }
    }

    async fn access_context(&self, context: H256) -> Result<AccessContext<SignerClient>, AccessError> {
        let address = self.handler.context_instance(context).await?;
        debug!("access context {:#x} at {:?}", context, address);
        AccessContext::new(address, self.client.clone())
    }
}

#[async_trait]
impl ChainGateway for EthersGateway {
    async fn pending_nonce(&self, address: Address) -> Result<U256, AccessError> {
        self.bounded("pending nonce", AccessError::ChainRpc, async {
            self.client
                .get_transaction_count(address, Some(BlockNumber::Pending.into()))
                .await
                .map_err(|e| AccessError::ChainRpc(e.to_string()))
        })
        .await
    }

    async fn gas_price(&self) -> Result<U256, AccessError> {
        self.bounded("gas price", AccessError::ChainRpc, async {
            self.client
                .get_gas_price()
                .await
                .map_err(|e| AccessError::ChainRpc(e.to_string()))
        })
        .await
    }

    async fn is_session(&self, session: H256, did: H256) -> Result<bool, AccessError> {
        self.bounded("session lookup", AccessError::ChainRpc, async {
            match &self.session_registry {
                Some(registry) => registry.is_session_valid(session).await,
                None => self.handler.is_session(session, did).await,
            }
        })
        .await
    }

    async fn has_role(&self, context: H256, role: H256, did: H256) -> Result<bool, AccessError> {
        self.bounded("role lookup", AccessError::ChainRpc, async {
            self.access_context(context).await?.has_role(role, did).await
        })
        .await
    }

    async fn grant_role(&self, call: GrantRoleCall, opts: &TxOptions) -> Result<H256, AccessError> {
        self.bounded("grantRole", AccessError::TransactionSubmission, async {
            let instance = self.access_context(call.context).await?;
            instance.grant_role(&call, opts).await
        })
        .await
    }

    fn can_deploy_policy(&self) -> bool {
        self.policy_artifact.is_some()
    }

    async fn send_policy_deployment(&self, uris: &[String], opts: &TxOptions) -> Result<H256, AccessError> {
        let artifact = self
            .policy_artifact
            .as_ref()
            .ok_or_else(|| AccessError::Validation("no policy contract artifact configured".into()))?;
        let args = artifact.constructor_args(uris)?;

        let factory = ContractFactory::new(artifact.abi.clone(), artifact.bytecode.clone(), self.client.clone());
        let mut deployer = factory
            .deploy_tokens(args)
            .map_err(|e| AccessError::TransactionSubmission(format!("policy deployment: {}", e)))?;
        if opts.is_legacy() {
            deployer = deployer.legacy();
        }
        opts.apply(&mut deployer.tx);
        let tx = deployer.tx;

        self.bounded("policy deployment", AccessError::TransactionSubmission, async {
            let pending = self
                .client
                .send_transaction(tx, None)
                .await
                .map_err(|e| AccessError::TransactionSubmission(format!("policy deployment: {}", e)))?;
            let tx_hash = pending.tx_hash();
            info!("sent policy deployment {:?}", tx_hash);
            Ok(tx_hash)
        })
        .await
    }

    async fn register_policy(&self, call: RegisterPolicyCall, opts: &TxOptions) -> Result<H256, AccessError> {
        self.bounded("registerPolicy", AccessError::TransactionSubmission, async {
            let instance = self.access_context(call.context).await?;
            instance.register_policy(&call, opts).await
        })
        .await
    }

    async fn context_address(&self, context: H256) -> Result<Option<Address>, AccessError> {
        self.bounded("context lookup", AccessError::ChainRpc, self.handler.context_address(context))
            .await
    }

    async fn create_context(&self, call: CreateContextCall, opts: &TxOptions) -> Result<H256, AccessError> {
        self.bounded(
            "createContextInstance",
            AccessError::TransactionSubmission,
            self.handler.create_context_instance(&call, opts),
        )
        .await
    }

    async fn register_resource(&self, call: RegisterResourceCall, opts: &TxOptions) -> Result<H256, AccessError> {
        self.bounded("setupRole", AccessError::TransactionSubmission, async {
            let instance = self.access_context(call.context).await?;
            instance.setup_role(&call, opts).await
        })
        .await
    }

    async fn wait_mined(&self, tx: H256) -> Result<MinedTransaction, AccessError> {
        let receipt = self
            .bounded("waiting for transaction", AccessError::TransactionSubmission, async {
                PendingTransaction::new(tx, self.client.provider())
                    .await
                    .map_err(|e| AccessError::TransactionSubmission(format!("waiting for {:?}: {}", tx, e)))
            })
            .await?
            .ok_or_else(|| AccessError::TransactionSubmission(format!("transaction {:?} was dropped", tx)))?;

        if receipt.status == Some(U64::zero()) {
            return Err(AccessError::TransactionSubmission(format!("transaction {:?} reverted", tx)));
        }
        debug!("transaction {:?} mined in block {:?}", tx, receipt.block_number);
        Ok(MinedTransaction {
            tx_hash: tx,
            contract_address: receipt.contract_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(constructor_inputs: serde_json::Value) -> PolicyArtifact {
        serde_json::from_value(json!({
            "abi": [{ "type": "constructor", "stateMutability": "nonpayable", "inputs": constructor_inputs }],
            "bytecode": "0x6080"
        }))
        .unwrap()
    }

    fn uris() -> Vec<String> {
        (1..=4).map(|i| format!("ipfs://cid{}", i)).collect()
    }

    #[test]
    fn test_constructor_without_inputs_gets_no_args() {
        assert!(artifact(json!([])).constructor_args(&uris()).unwrap().is_empty());
    }

    #[test]
    fn test_constructor_with_uri_strings_gets_uris() {
        let inputs: Vec<_> = (0..4).map(|i| json!({"name": format!("u{}", i), "type": "string"})).collect();
        let args = artifact(json!(inputs)).constructor_args(&uris()).unwrap();
        assert_eq!(args[0], Token::String("ipfs://cid1".into()));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_unexpected_constructor_is_rejected() {
        let inputs = json!([{"name": "owner", "type": "address"}]);
        assert!(matches!(
            artifact(inputs).constructor_args(&uris()),
            Err(AccessError::Validation(_))
        ));
    }
}
