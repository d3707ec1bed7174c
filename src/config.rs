// src/config.rs
//! Service configuration.
//!
//! Settings are read once at start-up from the process environment (optionally
//! seeded from a `.env` file by `main`) and an optional `config/default` file,
//! then passed by value into every constructor that needs them.
//!
//! ## Environment Variables
//! - `PRIVATE_KEY`: hex-encoded secp256k1 key of the service wallet
//! - `CHAIN_ID`: chain id used for the wallet DID and transaction signing
//! - `RPC_URL`: JSON-RPC endpoint of the chain
//! - `ACCESS_CONTEXT_HANDLER_ADDRESS`: AccessContextHandler contract address
//! - `SESSION_REGISTRY_ADDRESS`: (Optional) SessionRegistry contract address
//! - `DID_REGISTRY_ADDRESS`: (Optional) DID registry used for DID resolution
//! - `IPFS_API_URL`: (Optional) IPFS node URL (default: http://localhost:5001)
//! - `USE_AUTH_TOKEN`: (Optional) enable bearer-token checks in the HTTP middleware
//! - `SESSION_KEY_ID`: (Optional) key store id of the session JWE key (default: `kid`)
//! - `SESSION_KEY`: (Optional) hex 32-byte session JWE key, imported into the key store at start-up
//! - `DID_DOCUMENTS_PATH`: (Optional) JSON file with DID documents resolvable without the registry
//! - `STORAGE_ENCRYPTION_KEY`: (Optional) hex 32-byte key for encryption at rest
//! - `REDIS_URL`: (Optional) Redis backend; in-memory storage when unset
//! - `SERVER_ADDR`: (Optional) listen address (default: 127.0.0.1:3000)
//! - `RPC_TIMEOUT_SECS`: (Optional) upper bound for a single chain call (default: 30)
//! - `GAS_LIMIT`: (Optional) gas ceiling for submitted transactions (default: 8000000)
//! - `POLICY_ARTIFACT_PATH`: (Optional) hardhat artifact of the policy contract to deploy
//! - `FILESTORE_PATH`: (Optional) directory served at `/files` to verified sessions

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_IPFS_API_URL: &str = "http://localhost:5001";
pub const DEFAULT_SESSION_KEY_ID: &str = "kid";
pub const DEFAULT_GAS_LIMIT: u64 = 8_000_000;

/// Typed service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub private_key: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub access_context_handler_address: String,
    #[serde(default)]
    pub session_registry_address: Option<String>,
    #[serde(default)]
    pub did_registry_address: Option<String>,
    #[serde(default = "default_ipfs_api_url")]
    pub ipfs_api_url: String,
    #[serde(default)]
    pub use_auth_token: bool,
    #[serde(default = "default_session_key_id")]
    pub session_key_id: String,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub did_documents_path: Option<String>,
    #[serde(default)]
    pub storage_encryption_key: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub policy_artifact_path: Option<String>,
    #[serde(default)]
    pub filestore_path: Option<String>,
}

fn default_ipfs_api_url() -> String {
    DEFAULT_IPFS_API_URL.to_string()
}

fn default_session_key_id() -> String {
    DEFAULT_SESSION_KEY_ID.to_string()
}

fn default_server_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

impl Settings {
    /// Loads settings from `config/default.*` (if present) overlaid by the environment.
    ///
    /// # Errors
    /// Returns error if a required variable is missing or a value fails to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let settings: Settings = Config::builder()
            .set_override("private_key", "01").unwrap()
            .set_override("chain_id", 31337).unwrap()
            .set_override("rpc_url", "http://localhost:8545").unwrap()
            .set_override("access_context_handler_address", "0x0000000000000000000000000000000000000001").unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.chain_id, 31337);
        assert_eq!(settings.ipfs_api_url, DEFAULT_IPFS_API_URL);
        assert_eq!(settings.session_key_id, DEFAULT_SESSION_KEY_ID);
        assert_eq!(settings.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(settings.rpc_timeout(), Duration::from_secs(30));
        assert!(!settings.use_auth_token);
        assert!(settings.redis_url.is_none());
        assert!(settings.session_key.is_none());
        assert!(settings.filestore_path.is_none());
    }
}
