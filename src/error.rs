// src/error.rs
//! Error taxonomy for the access-control protocol.
//!
//! Issuance, granting and publication surface these errors to their callers.
//! Verification never does: it folds every failure into a `VerifySessionOutput`
//! with `verified == false` and the error's display text as the reason.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised by the session, role and policy services.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The request was empty or malformed; nothing was attempted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The session JWE could not be decrypted (bad key, bad ciphertext, wrong addressee).
    #[error("could not decrypt session JWE: {0}")]
    Decryption(String),

    /// The session token does not have the expected shape.
    #[error("malformed session token: {0}")]
    MalformedToken(String),

    /// DID resolution, key lookup or signature check failed.
    #[error("verifying token from did<{did}> with kid<{kid}>: {reason}")]
    SignatureVerification {
        did: String,
        kid: String,
        reason: String,
    },

    /// The session token's `exp` lies in the past.
    #[error("session expired")]
    SessionExpired,

    #[error("{0} not found")]
    NotFound(String),

    /// Transport or node failure while talking to the chain.
    #[error("chain rpc failed: {0}")]
    ChainRpc(String),

    /// Nonce, gas, signing or submission failure for a state-changing call.
    #[error("transaction submission failed: {0}")]
    TransactionSubmission(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("artifact store error: {0}")]
    ArtifactStore(String),
}

impl AccessError {
    /// Builds a [`AccessError::SignatureVerification`] from anything printable.
    pub fn signature(did: &str, kid: &str, reason: impl ToString) -> Self {
        AccessError::SignatureVerification {
            did: did.to_string(),
            kid: kid.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = AccessError> = std::result::Result<T, E>;
