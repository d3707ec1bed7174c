// src/main.rs

//! # On-chain Access Control - Main Entry Point
//!
//! Initializes all core components and starts the API server.
//!
//! ## Initialization Sequence
//! 1. Load environment configuration (see [`onchain_access_control::config`])
//! 2. Open storage and the encryption-at-rest layer
//! 3. Build the service wallet and connect to the chain
//! 4. Wire DID resolution, key store and artifact store
//! 5. Start the API server

use anyhow::Context;
use dotenv::dotenv;
use log::{info, warn};
use onchain_access_control::blockchain::ethers_client::EthersGateway;
use onchain_access_control::config::Settings;
use onchain_access_control::services::access_control::AccessControlService;
use onchain_access_control::services::api_server::ApiServer;
use onchain_access_control::services::context_registrar::ContextRegistrar;
use onchain_access_control::services::did_resolver::{DidResolver, FallbackResolver, RegistryResolver, StaticResolver};
use onchain_access_control::services::keystore::StorageKeyStore;
use onchain_access_control::services::policy_publisher::PolicyPublisher;
use onchain_access_control::services::presentation::StoredPresentationDefinitions;
use onchain_access_control::services::role_granter::RoleGranter;
use onchain_access_control::services::session_issuer::SessionIssuer;
use onchain_access_control::services::session_verifier::SessionVerifier;
use onchain_access_control::storage::auth_storage::AuthStorage;
use onchain_access_control::storage::encryption::{AesGcmEncrypter, Encrypter};
use onchain_access_control::storage::ipfs_client::IpfsStorage;
use onchain_access_control::storage::kv::MemoryStorage;
use onchain_access_control::storage::redis_store::RedisStorage;
use onchain_access_control::storage::ServiceStorage;
use onchain_access_control::wallet::Wallet;
use ethers_core::utils::hex;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load().context("failed to load settings")?;

    let db: Arc<dyn ServiceStorage> = match &settings.redis_url {
        Some(url) => Arc::new(RedisStorage::open(url).context("failed to open redis storage")?),
        None => {
            warn!("REDIS_URL not set, sessions and roles are kept in memory");
            Arc::new(MemoryStorage::new())
        }
    };
    let encrypter: Option<Arc<dyn Encrypter>> = match &settings.storage_encryption_key {
        Some(key) => Some(Arc::new(
            AesGcmEncrypter::from_hex(key).context("invalid STORAGE_ENCRYPTION_KEY")?,
        )),
        None => {
            warn!("STORAGE_ENCRYPTION_KEY not set, records are stored unencrypted");
            None
        }
    };
    let storage = AuthStorage::new(db.clone(), encrypter.clone());

    let wallet = Arc::new(
        Wallet::from_private_key(&settings.private_key, settings.chain_id)
            .context("invalid PRIVATE_KEY")?
            .with_gas_limit(settings.gas_limit),
    );
    info!("service wallet {}", wallet.did());
    let gateway = EthersGateway::new(&settings, &wallet).context("failed to initialize chain gateway")?;

    // Queried concurrently; the first resolver to answer wins
    let mut resolvers: Vec<Arc<dyn DidResolver>> = Vec::new();
    match &settings.did_documents_path {
        Some(path) => resolvers.push(Arc::new(StaticResolver::from_file(path).context("failed to load DID documents")?)),
        None => resolvers.push(Arc::new(StaticResolver::default())),
    }
    if let Some(address) = &settings.did_registry_address {
        let registry = gateway.did_registry(address).context("invalid DID_REGISTRY_ADDRESS")?;
        resolvers.push(Arc::new(RegistryResolver::new(registry)));
    }
    let resolver = Arc::new(FallbackResolver::new(resolvers));

    let keystore = StorageKeyStore::new(db.clone(), encrypter);
    if let Some(key) = &settings.session_key {
        let key = hex::decode(key.trim_start_matches("0x")).context("invalid SESSION_KEY")?;
        keystore
            .store_key(&settings.session_key_id, &key)
            .await
            .context("failed to import SESSION_KEY")?;
    }

    let chain = Arc::new(gateway);
    let artifacts = Arc::new(IpfsStorage::new(&settings.ipfs_api_url).context("invalid IPFS_API_URL")?);
    let presentation = Arc::new(StoredPresentationDefinitions::new(db));

    let issuer = SessionIssuer::new(storage.clone(), Arc::new(keystore), resolver, settings.session_key_id.clone());
    let verifier = SessionVerifier::new(storage.clone(), issuer.clone(), chain.clone(), wallet.clone());
    let granter = RoleGranter::new(storage.clone(), chain.clone(), wallet.clone());
    let publisher = PolicyPublisher::new(storage.clone(), artifacts, presentation, chain.clone(), wallet.clone());
    let registrar = ContextRegistrar::new(storage.clone(), chain, wallet);
    let service = AccessControlService::new(issuer, verifier, granter, publisher, registrar, storage);

    let addr: SocketAddr = settings.server_addr.parse().context("invalid SERVER_ADDR")?;
    let mut api_server = ApiServer::new(service, settings.use_auth_token);
    if let Some(dir) = &settings.filestore_path {
        if !settings.use_auth_token {
            warn!("USE_AUTH_TOKEN is off, {} is served without bearer checks", dir);
        }
        api_server = api_server.with_filestore(dir);
    }
    info!("Available endpoints:");
    info!("- GET  /health");
    info!("- POST /v1/sessions");
    info!("- PUT  /v1/sessions/verification");
    info!("- POST /v1/roles");
    info!("- GET  /v1/roles/:id");
    info!("- POST /v1/policies");
    info!("- POST /v1/contexts");
    info!("- POST /v1/resources");
    if settings.filestore_path.is_some() {
        info!("- GET  /files/*path");
    }

    api_server.run(addr).await.context("API server failed")?;
    Ok(())
}
