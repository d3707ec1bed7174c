// src/test_support.rs
//! Shared fixtures for unit tests: signing keys, tokens, and in-memory
//! stand-ins for the chain, the artifact store and the key store.

use crate::blockchain::gateway::{
    ChainGateway, CreateContextCall, GrantRoleCall, MinedTransaction, RegisterPolicyCall, RegisterResourceCall,
};
use crate::error::AccessError;
use crate::models::did::{DIDDocument, PublicKeyJwk, VerificationMethod};
use crate::services::access_control::AccessControlService;
use crate::services::context_registrar::ContextRegistrar;
use crate::services::did_resolver::StaticResolver;
use crate::services::keystore::KeyStore;
use crate::services::policy_publisher::PolicyPublisher;
use crate::services::presentation::StoredPresentationDefinitions;
use crate::services::role_granter::RoleGranter;
use crate::services::session_issuer::SessionIssuer;
use crate::services::session_verifier::SessionVerifier;
use crate::storage::auth_storage::AuthStorage;
use crate::storage::ipfs_client::ArtifactStore;
use crate::storage::kv::MemoryStorage;
use crate::token::jwe;
use crate::utils::crypto::hash_data;
use crate::utils::serialization::b64url_encode;
use crate::wallet::transaction::TxOptions;
use crate::wallet::Wallet;
use async_trait::async_trait;
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::hex;
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Session JWE content key shared by the fixtures.
pub const SESSION_KEY: [u8; 32] = [7u8; 32];

/// Private key of the service wallet in tests (a well-known dev key).
pub const WALLET_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

/// Deterministic secp256k1 key of a token issuer.
pub struct TestKey {
    signing: SigningKey,
}

impl TestKey {
    pub fn from_seed(seed: u8) -> Self {
        let signing = SigningKey::from_slice(&[seed; 32]).unwrap();
        TestKey { signing }
    }

    pub fn jwk(&self) -> PublicKeyJwk {
        let point = self.signing.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        PublicKeyJwk {
            kty: "EC".into(),
            crv: "secp256k1".into(),
            x: b64url_encode(&bytes[1..33]),
            y: b64url_encode(&bytes[33..65]),
        }
    }
}

/// DID document with a single JWK verification method `<did>#<fragment>`.
pub fn did_document(did: &str, fragment: &str, key: &TestKey) -> DIDDocument {
    DIDDocument {
        id: did.to_string(),
        verification_method: vec![VerificationMethod {
            id: format!("{}#{}", did, fragment),
            method_type: "EcdsaSecp256k1VerificationKey2019".into(),
            controller: did.to_string(),
            public_key_jwk: Some(key.jwk()),
            public_key_hex: None,
        }],
        service_endpoint: None,
    }
}

/// Compact ES256K token over `claims`; an empty `kid` leaves it out of the header.
pub fn signed_token(key: &TestKey, kid: &str, claims: Value) -> String {
    let mut header = json!({"alg": "ES256K", "typ": "JWT"});
    if !kid.is_empty() {
        header["kid"] = json!(kid);
    }
    let input = format!("{}.{}", b64url_encode(header.to_string()), b64url_encode(claims.to_string()));
    let signature: Signature = key.signing.sign(input.as_bytes());
    format!("{}.{}", input, b64url_encode(signature.to_bytes()))
}

/// Wraps `token` in a session JWE under [`SESSION_KEY`].
pub fn sealed_session(token: &str, kid: &str) -> String {
    jwe::encrypt_compact(token.as_bytes(), &SESSION_KEY, kid).unwrap()
}

pub fn test_wallet() -> Wallet {
    Wallet::from_private_key(WALLET_KEY, 31337).unwrap()
}

/// Key store holding one key that counts its lookups.
pub struct CountingKeyStore {
    keys: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl CountingKeyStore {
    pub fn with_key(id: &str, key: Vec<u8>) -> Self {
        CountingKeyStore {
            keys: HashMap::from([(id.to_string(), key)]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyStore for CountingKeyStore {
    async fn get_key(&self, id: &str) -> Result<Vec<u8>, AccessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .get(id)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(format!("key {}", id)))
    }
}

#[derive(Default)]
struct GatewayState {
    pending_nonce: u64,
    nonce_calls: usize,
    gas_price_calls: usize,
    sessions: HashSet<(H256, H256)>,
    session_failure: Option<String>,
    is_session_calls: usize,
    roles: HashSet<(H256, H256, H256)>,
    submission_failure: Option<String>,
    granted: Vec<GrantRoleCall>,
    last_options: Option<TxOptions>,
    can_deploy: bool,
    deployments: usize,
    registered: Vec<RegisterPolicyCall>,
    deployed_at: HashMap<H256, Address>,
    stall_receipts: bool,
    contexts: HashMap<H256, Address>,
    context_lookups: usize,
    created_contexts: Vec<CreateContextCall>,
    resources: Vec<RegisterResourceCall>,
    nonces: Vec<U256>,
    submitted: u64,
}

/// In-memory chain: sessions and roles are whatever the test adds.
pub struct MockGateway {
    state: Mutex<GatewayState>,
}

impl MockGateway {
    pub fn new() -> Self {
        MockGateway {
            state: Mutex::new(GatewayState {
                can_deploy: true,
                ..Default::default()
            }),
        }
    }

    pub fn set_pending_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().pending_nonce = nonce;
    }

    pub fn nonce_calls(&self) -> usize {
        self.state.lock().unwrap().nonce_calls
    }

    pub fn gas_price_calls(&self) -> usize {
        self.state.lock().unwrap().gas_price_calls
    }

    pub fn add_session(&self, session: H256, did: H256) {
        self.state.lock().unwrap().sessions.insert((session, did));
    }

    pub fn fail_session_lookups(&self, message: &str) {
        self.state.lock().unwrap().session_failure = Some(message.to_string());
    }

    pub fn is_session_calls(&self) -> usize {
        self.state.lock().unwrap().is_session_calls
    }

    pub fn add_role(&self, context: H256, role: H256, did: H256) {
        self.state.lock().unwrap().roles.insert((context, role, did));
    }

    pub fn fail_submissions(&self, message: &str) {
        self.state.lock().unwrap().submission_failure = Some(message.to_string());
    }

    pub fn granted(&self) -> Vec<GrantRoleCall> {
        self.state.lock().unwrap().granted.clone()
    }

    pub fn last_options(&self) -> Option<TxOptions> {
        self.state.lock().unwrap().last_options.clone()
    }

    pub fn set_can_deploy(&self, can_deploy: bool) {
        self.state.lock().unwrap().can_deploy = can_deploy;
    }

    pub fn deployments(&self) -> usize {
        self.state.lock().unwrap().deployments
    }

    pub fn registered(&self) -> Vec<RegisterPolicyCall> {
        self.state.lock().unwrap().registered.clone()
    }

    /// Leaves every receipt wait pending forever.
    pub fn stall_receipts(&self) {
        self.state.lock().unwrap().stall_receipts = true;
    }

    pub fn add_context(&self, context: H256, address: Address) {
        self.state.lock().unwrap().contexts.insert(context, address);
    }

    pub fn context_lookups(&self) -> usize {
        self.state.lock().unwrap().context_lookups
    }

    pub fn created_contexts(&self) -> Vec<CreateContextCall> {
        self.state.lock().unwrap().created_contexts.clone()
    }

    pub fn resources(&self) -> Vec<RegisterResourceCall> {
        self.state.lock().unwrap().resources.clone()
    }

    /// Nonces of every accepted submission, in submission order.
    pub fn submitted_nonces(&self) -> Vec<U256> {
        self.state.lock().unwrap().nonces.clone()
    }

    /// Records a submission and returns its transaction hash.
    fn accept(state: &mut GatewayState, opts: &TxOptions) -> Result<H256, AccessError> {
        if let Some(message) = &state.submission_failure {
            return Err(AccessError::TransactionSubmission(message.clone()));
        }
        state.last_options = Some(opts.clone());
        state.nonces.push(opts.nonce);
        state.submitted += 1;
        Ok(H256::from_low_u64_be(state.submitted))
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn pending_nonce(&self, _address: Address) -> Result<U256, AccessError> {
        let mut state = self.state.lock().unwrap();
        state.nonce_calls += 1;
        Ok(U256::from(state.pending_nonce))
    }

    async fn gas_price(&self) -> Result<U256, AccessError> {
        self.state.lock().unwrap().gas_price_calls += 1;
        Ok(U256::from(1_000_000_000u64))
    }

    async fn is_session(&self, session: H256, did: H256) -> Result<bool, AccessError> {
        let mut state = self.state.lock().unwrap();
        state.is_session_calls += 1;
        if let Some(message) = &state.session_failure {
            return Err(AccessError::ChainRpc(message.clone()));
        }
        Ok(state.sessions.contains(&(session, did)))
    }

    async fn has_role(&self, context: H256, role: H256, did: H256) -> Result<bool, AccessError> {
        Ok(self.state.lock().unwrap().roles.contains(&(context, role, did)))
    }

    async fn grant_role(&self, call: GrantRoleCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let mut state = self.state.lock().unwrap();
        let hash = Self::accept(&mut state, opts)?;
        state.granted.push(call);
        Ok(hash)
    }

    fn can_deploy_policy(&self) -> bool {
        self.state.lock().unwrap().can_deploy
    }

    async fn send_policy_deployment(&self, _uris: &[String], opts: &TxOptions) -> Result<H256, AccessError> {
        let mut state = self.state.lock().unwrap();
        let hash = Self::accept(&mut state, opts)?;
        state.deployments += 1;
        let address = Address::from_low_u64_be(0x1000 + state.deployments as u64);
        state.deployed_at.insert(hash, address);
        Ok(hash)
    }

    async fn register_policy(&self, call: RegisterPolicyCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let mut state = self.state.lock().unwrap();
        let hash = Self::accept(&mut state, opts)?;
        state.registered.push(call);
        Ok(hash)
    }

    async fn context_address(&self, context: H256) -> Result<Option<Address>, AccessError> {
        let mut state = self.state.lock().unwrap();
        state.context_lookups += 1;
        Ok(state.contexts.get(&context).copied())
    }

    async fn create_context(&self, call: CreateContextCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let mut state = self.state.lock().unwrap();
        let hash = Self::accept(&mut state, opts)?;
        let address = Address::from_low_u64_be(0x2000 + state.created_contexts.len() as u64 + 1);
        state.contexts.insert(call.id, address);
        state.created_contexts.push(call);
        Ok(hash)
    }

    async fn register_resource(&self, call: RegisterResourceCall, opts: &TxOptions) -> Result<H256, AccessError> {
        let mut state = self.state.lock().unwrap();
        let hash = Self::accept(&mut state, opts)?;
        state.resources.push(call);
        Ok(hash)
    }

    async fn wait_mined(&self, tx: H256) -> Result<MinedTransaction, AccessError> {
        let (stalled, contract_address) = {
            let state = self.state.lock().unwrap();
            (state.stall_receipts, state.deployed_at.get(&tx).copied())
        };
        if stalled {
            futures::future::pending::<()>().await;
        }
        Ok(MinedTransaction {
            tx_hash: tx,
            contract_address,
        })
    }
}

/// Artifact store addressing content by its keccak hash.
#[derive(Default)]
pub struct MockArtifactStore {
    published: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl MockArtifactStore {
    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn fail(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn publish(&self, name: &str, data: Vec<u8>) -> Result<String, AccessError> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AccessError::ArtifactStore(message));
        }
        self.published.lock().unwrap().push(name.to_string());
        Ok(format!("ipfs://{}", &hex::encode(hash_data(&data))[..46]))
    }
}

/// Fully wired service over in-memory collaborators.
///
/// Sessions signed by `key` as `did:example:abc#key-1` and sealed with
/// `kid-1` are accepted.
pub struct TestService {
    pub service: AccessControlService,
    pub key: TestKey,
}

pub fn test_service() -> TestService {
    let key = TestKey::from_seed(1);
    let db = Arc::new(MemoryStorage::new());
    let storage = AuthStorage::new(db.clone(), None);
    let chain = Arc::new(MockGateway::new());
    let wallet = Arc::new(test_wallet());

    let issuer = SessionIssuer::new(
        storage.clone(),
        Arc::new(CountingKeyStore::with_key("kid-1", SESSION_KEY.to_vec())),
        Arc::new(StaticResolver::new(vec![did_document("did:example:abc", "key-1", &key)])),
        "kid-1",
    );
    let verifier = SessionVerifier::new(storage.clone(), issuer.clone(), chain.clone(), wallet.clone());
    let granter = RoleGranter::new(storage.clone(), chain.clone(), wallet.clone());
    let publisher = PolicyPublisher::new(
        storage.clone(),
        Arc::new(MockArtifactStore::default()),
        Arc::new(StoredPresentationDefinitions::new(db)),
        chain.clone(),
        wallet.clone(),
    );
    let registrar = ContextRegistrar::new(storage.clone(), chain, wallet);

    TestService {
        service: AccessControlService::new(issuer, verifier, granter, publisher, registrar, storage),
        key,
    }
}
