// src/wallet/key_management.rs
//! Service wallet: signing key, derived identity and serialized submission.
//!
//! The wallet is the one identity the service acts as on-chain:
//! - its address signs every state-changing transaction
//! - its DID (`did:pkh:eip155:<chainId>:<address>`) scopes session lookups
//! - its DID hash (keccak256 of the DID) is what contracts store
//!
//! Nonce acquisition and submission are serialized per wallet, so two
//! concurrent submissions never reuse a nonce.

use crate::blockchain::gateway::ChainGateway;
use crate::config::DEFAULT_GAS_LIMIT;
use crate::error::AccessError;
use crate::utils::crypto::hash_str;
use crate::wallet::transaction::{Fee, FeeRequest, TxOptions};
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::to_checksum;
use ethers_core::types::{Address, H256, U256};
use log::debug;
use std::future::Future;
use tokio::sync::Mutex;

/// Transaction-signing wallet of the service.
pub struct Wallet {
    signer: LocalWallet,
    chain_id: u64,
    did: String,
    did_hash: H256,
    gas_limit: U256,
    /// Nonce of the last accepted submission; also the submission lock
    last_nonce: Mutex<Option<U256>>,
}

impl Wallet {
    /// Creates a wallet from a hex-encoded secp256k1 private key.
    ///
    /// # Arguments
    /// * `private_key` - Hex-encoded private key (with or without 0x prefix)
    /// * `chain_id` - Chain the wallet signs for
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] if the key is not a valid secp256k1 scalar.
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self, AccessError> {
        let signer = private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| AccessError::Validation(format!("invalid wallet private key: {}", e)))?
            .with_chain_id(chain_id);

        let did = format!("did:pkh:eip155:{}:{}", chain_id, to_checksum(&signer.address(), None));
        let did_hash = hash_str(&did);

        Ok(Wallet {
            signer,
            chain_id,
            did,
            did_hash,
            gas_limit: U256::from(DEFAULT_GAS_LIMIT),
            last_nonce: Mutex::new(None),
        })
    }

    /// Overrides the gas ceiling applied to every submission.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = U256::from(gas_limit);
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn did_hash(&self) -> H256 {
        self.did_hash
    }

    /// Chain-id bound signer for building a signing middleware.
    pub fn signer(&self) -> LocalWallet {
        self.signer.clone()
    }

    /// Prepares options for a submission using `nonce`.
    ///
    /// # Arguments
    /// * `chain` - Gateway used to fetch the gas price
    /// * `nonce` - Nonce the transaction will use
    /// * `fee` - Caller supplied EIP-1559 caps; the node's gas price otherwise
    pub async fn transaction_options(
        &self,
        chain: &dyn ChainGateway,
        nonce: U256,
        fee: Option<FeeRequest>,
    ) -> Result<TxOptions, AccessError> {
        let fee = match fee {
            Some(fee) => Fee::from(fee),
            None => Fee::Legacy {
                gas_price: chain
                    .gas_price()
                    .await
                    .map_err(|e| AccessError::TransactionSubmission(format!("could not get gas price: {}", e)))?,
            },
        };

        Ok(TxOptions {
            from: self.address(),
            nonce,
            gas_limit: self.gas_limit,
            fee,
            chain_id: self.chain_id,
        })
    }

    /// Runs one submission under the wallet's submission lock.
    ///
    /// The nonce is the node's pending nonce, raised above the last nonce this
    /// wallet used when the node has not seen that transaction yet. The last
    /// nonce only advances when `submit` succeeds.
    ///
    /// # Arguments
    /// * `chain` - Gateway used for nonce and gas price
    /// * `fee` - Optional EIP-1559 caps
    /// * `submit` - Sends the transaction with the prepared options
    pub async fn submit<T, F, Fut>(
        &self,
        chain: &dyn ChainGateway,
        fee: Option<FeeRequest>,
        submit: F,
    ) -> Result<T, AccessError>
    where
        F: FnOnce(TxOptions) -> Fut,
        Fut: Future<Output = Result<T, AccessError>>,
    {
        let mut last_nonce = self.last_nonce.lock().await;

        let pending = chain
            .pending_nonce(self.address())
            .await
            .map_err(|e| AccessError::TransactionSubmission(format!("could not get nonce: {}", e)))?;
        let nonce = match *last_nonce {
            Some(last) if last >= pending => last + 1,
            _ => pending,
        };

        let opts = self.transaction_options(chain, nonce, fee).await?;
        debug!("submitting transaction from {:?} with nonce {}", opts.from, nonce);

        let out = submit(opts).await?;
        *last_nonce = Some(nonce);
        Ok(out)
    }
}
