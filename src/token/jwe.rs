// src/token/jwe.rs
//! Compact JWE transport of session tokens.
//!
//! Only direct encryption is supported: `alg = "dir"`, `enc = "A256GCM"`, with
//! the 32-byte content key shared between the relayer and this service through
//! the key store. Layout:
//! ```text
//! base64url(header) . "" . base64url(iv) . base64url(ciphertext) . base64url(tag)
//! ```
//! The encoded protected header is the additional authenticated data.

use crate::error::AccessError;
use crate::utils::serialization::{b64url_decode, b64url_encode};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

pub const ALG_DIR: &str = "dir";
pub const ENC_A256GCM: &str = "A256GCM";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

fn content_key(key: &[u8]) -> Result<LessSafeKey, AccessError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| AccessError::Decryption(format!("content key must be 32 bytes, got {}", key.len())))?;
    Ok(LessSafeKey::new(unbound))
}

fn decode(name: &str, segment: &str) -> Result<Vec<u8>, AccessError> {
    b64url_decode(segment).map_err(|e| AccessError::Decryption(format!("invalid {} encoding: {}", name, e)))
}

/// Reads the protected header of a compact JWE without decrypting it.
pub fn peek_header(jwe: &str) -> Result<JweHeader, AccessError> {
    let header = jwe.trim().split('.').next().unwrap_or_default();
    serde_json::from_slice(&decode("header", header)?)
        .map_err(|e| AccessError::Decryption(format!("invalid JWE header: {}", e)))
}

/// Decrypts a compact JWE addressed to `key_id`.
///
/// # Arguments
/// * `jwe` - Compact serialized JWE
/// * `key` - 32-byte content key
/// * `key_id` - Id of the key; a header `kid` must match it when present
///
/// # Returns
/// The decrypted payload, the signed session token.
///
/// # Errors
/// Returns [`AccessError::Decryption`] on any structural, header, key or
/// authentication failure.
pub fn decrypt_compact(jwe: &str, key: &[u8], key_id: &str) -> Result<Vec<u8>, AccessError> {
    let parts: Vec<&str> = jwe.trim().split('.').collect();
    let [header_b64, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
        return Err(AccessError::Decryption(format!(
            "compact JWE must have 5 segments, got {}",
            parts.len()
        )));
    };

    let header = peek_header(header_b64)?;
    if header.alg != ALG_DIR || header.enc != ENC_A256GCM {
        return Err(AccessError::Decryption(format!(
            "unsupported JWE algorithm {}/{}",
            header.alg, header.enc
        )));
    }
    if let Some(kid) = header.kid.as_deref() {
        if kid != key_id {
            return Err(AccessError::Decryption(format!("JWE addressed to key {}, expected {}", kid, key_id)));
        }
    }
    if !encrypted_key.is_empty() {
        return Err(AccessError::Decryption("direct encryption must not carry an encrypted key".into()));
    }

    let iv: [u8; NONCE_LEN] = decode("iv", iv)?
        .try_into()
        .map_err(|_| AccessError::Decryption("iv must be 12 bytes".into()))?;
    let mut in_out = decode("ciphertext", ciphertext)?;
    in_out.extend_from_slice(&decode("tag", tag)?);

    let plaintext = content_key(key)?
        .open_in_place(
            Nonce::assume_unique_for_key(iv),
            Aad::from(header_b64.as_bytes()),
            &mut in_out,
        )
        .map_err(|_| AccessError::Decryption("authentication failed".into()))?;
    Ok(plaintext.to_vec())
}

/// Encrypts `payload` into a compact JWE addressed to `key_id`.
pub fn encrypt_compact(payload: &[u8], key: &[u8], key_id: &str) -> Result<String, AccessError> {
    let header = JweHeader {
        alg: ALG_DIR.to_string(),
        enc: ENC_A256GCM.to_string(),
        kid: Some(key_id.to_string()),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| AccessError::Validation(format!("invalid JWE header: {}", e)))?;
    let header_b64 = b64url_encode(header_json);

    let mut iv = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| AccessError::Validation("could not generate JWE iv".into()))?;

    let mut in_out = payload.to_vec();
    let tag = content_key(key)?
        .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::from(header_b64.as_bytes()), &mut in_out)
        .map_err(|_| AccessError::Validation("could not encrypt JWE payload".into()))?;

    Ok(format!(
        "{}..{}.{}.{}",
        header_b64,
        b64url_encode(iv),
        b64url_encode(&in_out),
        b64url_encode(tag.as_ref())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [3u8; 32];

    #[test]
    fn test_decrypts_what_it_encrypts() {
        let jwe = encrypt_compact(b"header.payload.sig", &KEY, "kid-1").unwrap();
        assert_eq!(jwe.split('.').count(), 5);
        assert_eq!(peek_header(&jwe).unwrap().kid.as_deref(), Some("kid-1"));
        assert_eq!(decrypt_compact(&jwe, &KEY, "kid-1").unwrap(), b"header.payload.sig");
    }

    #[test]
    fn test_wrong_key_or_addressee_fails() {
        let jwe = encrypt_compact(b"token", &KEY, "kid-1").unwrap();
        assert!(matches!(decrypt_compact(&jwe, &[4u8; 32], "kid-1"), Err(AccessError::Decryption(_))));
        assert!(matches!(decrypt_compact(&jwe, &KEY, "kid-2"), Err(AccessError::Decryption(_))));
        assert!(matches!(decrypt_compact(&jwe, &KEY[..16], "kid-1"), Err(AccessError::Decryption(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let jwe = encrypt_compact(b"token", &KEY, "kid-1").unwrap();
        let mut parts: Vec<String> = jwe.split('.').map(String::from).collect();
        parts[3] = b64url_encode(b"TOKEN");
        let tampered = parts.join(".");
        assert!(matches!(decrypt_compact(&tampered, &KEY, "kid-1"), Err(AccessError::Decryption(_))));
    }

    #[test]
    fn test_structural_errors() {
        assert!(decrypt_compact("a.b.c", &KEY, "kid-1").is_err());
        assert!(decrypt_compact("", &KEY, "kid-1").is_err());
    }
}
