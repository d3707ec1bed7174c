// src/token/mod.rs
//! Session token codec.
//!
//! Session tokens are DID-signed JWTs ([`jws`]) delivered inside a compact JWE
//! ([`jwe`]). [`signature`] checks a parsed token against the issuer's DID document.

pub mod jwe;
pub mod jws;
pub mod signature;

pub use jws::{ParsedToken, TokenClaims, TokenHeader};
