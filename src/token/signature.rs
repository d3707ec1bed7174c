// src/token/signature.rs
//! DID-based signature verification of session tokens.
//!
//! The verification method is located in the issuer's DID document by the
//! token's `kid`. Supported algorithms:
//! - `ES256K`: ECDSA over secp256k1 with SHA-256 (via `k256`)
//! - `ES256`: ECDSA over P-256 with SHA-256 (via `p256`)
//!
//! Public keys are read from `publicKeyJwk` (`x`/`y` coordinates) or
//! `publicKeyHex` (SEC1 encoded).

use super::jws::ParsedToken;
use crate::error::AccessError;
use crate::models::did::{DIDDocument, VerificationMethod};
use crate::utils::serialization::b64url_decode;
use ethers_core::utils::hex;
use k256::ecdsa::signature::Verifier;

pub const ES256K: &str = "ES256K";
pub const ES256: &str = "ES256";

/// Verifies `token` against the verification method its `kid` names in `document`.
///
/// # Arguments
/// * `token` - Parsed session token
/// * `document` - Resolved DID document of the token issuer
///
/// # Errors
/// Returns [`AccessError::MalformedToken`] if the token has no `kid` or `iss`,
/// and [`AccessError::SignatureVerification`] if the document is not the
/// issuer's, the key cannot be found or decoded, or the signature does not match.
pub fn verify_token_signature(token: &ParsedToken, document: &DIDDocument) -> Result<(), AccessError> {
    let kid = token.kid()?;
    let issuer = token.issuer()?;
    let did = document.id.as_str();

    if did != issuer {
        return Err(AccessError::signature(
            issuer,
            kid,
            format!("resolved document belongs to {}", did),
        ));
    }

    if let Some((kid_did, _)) = kid.split_once('#') {
        if !kid_did.is_empty() && kid_did != did {
            return Err(AccessError::signature(did, kid, "key id does not belong to the issuer"));
        }
    }

    let method = document
        .find_verification_method(kid)
        .ok_or_else(|| AccessError::signature(did, kid, "no verification method for key id"))?;
    let key = public_key_bytes(method).map_err(|reason| AccessError::signature(did, kid, reason))?;

    let message = token.signing_input.as_bytes();
    let verified = match token.header.alg.as_str() {
        ES256K => verify_es256k(&key, message, &token.signature),
        ES256 => verify_es256(&key, message, &token.signature),
        other => Err(format!("unsupported signature algorithm {:?}", other)),
    };
    verified.map_err(|reason| AccessError::signature(did, kid, reason))
}

/// SEC1 encoded public key of a verification method.
fn public_key_bytes(method: &VerificationMethod) -> Result<Vec<u8>, String> {
    if let Some(jwk) = &method.public_key_jwk {
        let x = b64url_decode(&jwk.x).map_err(|e| format!("invalid jwk x: {}", e))?;
        let y = b64url_decode(&jwk.y).map_err(|e| format!("invalid jwk y: {}", e))?;
        if x.len() != 32 || y.len() != 32 {
            return Err("jwk coordinates must be 32 bytes".into());
        }
        let mut key = Vec::with_capacity(65);
        key.push(0x04);
        key.extend_from_slice(&x);
        key.extend_from_slice(&y);
        return Ok(key);
    }
    if let Some(key_hex) = &method.public_key_hex {
        return hex::decode(key_hex.trim_start_matches("0x")).map_err(|e| format!("invalid publicKeyHex: {}", e));
    }
    Err(format!("verification method {} has no supported key material", method.id))
}

fn verify_es256k(key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), String> {
    let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(|e| format!("invalid secp256k1 key: {}", e))?;
    let signature =
        k256::ecdsa::Signature::from_slice(signature).map_err(|e| format!("invalid signature encoding: {}", e))?;
    // high-S signatures are valid JOSE but rejected by k256
    let signature = signature.normalize_s().unwrap_or(signature);
    key.verify(message, &signature).map_err(|_| "signature mismatch".to_string())
}

fn verify_es256(key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), String> {
    let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key).map_err(|e| format!("invalid P-256 key: {}", e))?;
    let signature =
        p256::ecdsa::Signature::from_slice(signature).map_err(|e| format!("invalid signature encoding: {}", e))?;
    key.verify(message, &signature).map_err(|_| "signature mismatch".to_string())
}
