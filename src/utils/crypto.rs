// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Uses Keccak-256 (Ethereum's standard hash function) for every identifier
//! that is shared between the local store and the contracts.

use ethers::utils::keccak256;
use ethers_core::types::H256;

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Keccak-256 of a UTF-8 string as an `H256`, the shape contracts take for ids and DIDs.
pub fn hash_str(value: &str) -> H256 {
    H256::from(hash_data(value.as_bytes()))
}
