// src/contracts/mod.rs
//! Thin bindings over the access-control contracts.
//!
//! ABIs are embedded from `src/abi/` and loaded per binding; arguments are
//! passed as explicit ABI tokens.

pub mod access_context;
pub mod did_registry;
pub mod session_registry;

use crate::error::AccessError;
use ethers_core::abi::{Abi, Token};
use ethers_core::types::H256;

/// Loads an embedded JSON ABI.
pub(crate) fn load_abi(name: &str, json: &[u8]) -> Result<Abi, AccessError> {
    Abi::load(json).map_err(|e| AccessError::ChainRpc(format!("could not load {} ABI: {}", name, e)))
}

pub(crate) fn bytes32(value: H256) -> Token {
    Token::FixedBytes(value.as_bytes().to_vec())
}

pub(crate) fn bytes32_array(values: &[H256]) -> Token {
    Token::Array(values.iter().copied().map(bytes32).collect())
}
