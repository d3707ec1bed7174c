// src/lib.rs
//! # On-chain Access Control
//!
//! Authorization service backed by access-control contracts:
//! - sessions relayed as JWEs wrapping DID-signed tokens, verified and cached
//! - roles granted on-chain against zero-knowledge policy proofs
//! - policies published to IPFS and registered with their verifier contract

pub mod blockchain;    // chain gateway over ethers
pub mod config;        // environment driven settings
pub mod contracts;     // contract bindings
pub mod error;
pub mod models;        // data structures
pub mod services;      // business logic and API
pub mod storage;       // key/value, encryption and IPFS
pub mod token;         // JWS/JWE handling
pub mod utils;         // helper functions
pub mod wallet;        // service wallet and transactions

#[cfg(test)]
pub(crate) mod test_support;
