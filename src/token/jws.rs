// src/token/jws.rs
//! Signed session token parsing.
//!
//! Accepts the three JWS serializations:
//! - compact: `header.payload.signature`
//! - flattened JSON: `{"protected", "payload", "signature"}`
//! - general JSON: `{"payload", "signatures": [{"protected", "signature"}]}`
//!
//! Session tokens must carry exactly one signature, whatever the serialization.
//! Parsing never trusts the signature; see [`crate::token::signature`].

use crate::error::AccessError;
use crate::utils::serialization::b64url_decode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Protected header of a session token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TokenHeader {
    #[serde(default)]
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Claims consumed from a session token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// `aud` may be a single string or a list
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Aud {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<Aud>::deserialize(deserializer)? {
        Some(Aud::One(aud)) => vec![aud],
        Some(Aud::Many(aud)) => aud,
        None => Vec::new(),
    })
}

/// A parsed, not yet verified, session token.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    /// The token exactly as presented
    pub raw: String,
    pub header: TokenHeader,
    pub claims: TokenClaims,
    /// `base64url(protected) "." base64url(payload)`, the bytes that were signed
    pub signing_input: String,
    pub signature: Vec<u8>,
}

#[derive(Deserialize)]
struct JsonSignature {
    #[serde(default)]
    protected: Option<String>,
    signature: String,
}

#[derive(Deserialize)]
struct JsonSerialization {
    payload: String,
    #[serde(default)]
    protected: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signatures: Option<Vec<JsonSignature>>,
}

impl ParsedToken {
    /// Parses a session token in any JWS serialization.
    ///
    /// # Arguments
    /// * `token` - Compact or JSON serialized JWS
    ///
    /// # Errors
    /// Returns [`AccessError::MalformedToken`] if the token does not carry
    /// exactly one signature or any segment fails to decode.
    pub fn parse(token: &str) -> Result<Self, AccessError> {
        let raw = token.trim();
        if raw.is_empty() {
            return Err(AccessError::MalformedToken("empty token".into()));
        }

        let (protected, payload, signature) = if raw.starts_with('{') {
            split_json(raw)?
        } else {
            split_compact(raw)?
        };

        let header: TokenHeader = decode_segment("protected header", &protected)?;
        let claims: TokenClaims = decode_segment("payload", &payload)?;
        let signature = b64url_decode(&signature)
            .map_err(|e| AccessError::MalformedToken(format!("invalid signature encoding: {}", e)))?;

        Ok(ParsedToken {
            raw: raw.to_string(),
            header,
            claims,
            signing_input: format!("{}.{}", protected, payload),
            signature,
        })
    }

    /// Signing key id from the protected header.
    pub fn kid(&self) -> Result<&str, AccessError> {
        match self.header.kid.as_deref() {
            Some(kid) if !kid.is_empty() => Ok(kid),
            _ => Err(AccessError::MalformedToken("missing kid in protected header".into())),
        }
    }

    /// Unique token id, which is also the session id.
    pub fn jti(&self) -> Result<&str, AccessError> {
        match self.claims.jti.as_deref() {
            Some(jti) if !jti.is_empty() => Ok(jti),
            _ => Err(AccessError::MalformedToken("missing jti claim".into())),
        }
    }

    /// Issuer DID.
    pub fn issuer(&self) -> Result<&str, AccessError> {
        match self.claims.iss.as_deref() {
            Some(iss) if !iss.is_empty() => Ok(iss),
            _ => Err(AccessError::MalformedToken("missing iss claim".into())),
        }
    }
}

fn signature_count_error(count: usize) -> AccessError {
    AccessError::MalformedToken(format!("expected 1 signature, got {}", count))
}

fn split_compact(raw: &str) -> Result<(String, String, String), AccessError> {
    let parts: Vec<&str> = raw.split('.').collect();
    match parts.as_slice() {
        [protected, payload, signature] => {
            if signature.is_empty() {
                return Err(signature_count_error(0));
            }
            Ok((protected.to_string(), payload.to_string(), signature.to_string()))
        }
        _ => Err(AccessError::MalformedToken(format!(
            "compact token must have 3 segments, got {}",
            parts.len()
        ))),
    }
}

fn split_json(raw: &str) -> Result<(String, String, String), AccessError> {
    let jws: JsonSerialization = serde_json::from_str(raw)
        .map_err(|e| AccessError::MalformedToken(format!("invalid JSON serialization: {}", e)))?;

    let mut signatures = match (jws.signatures, jws.signature) {
        (Some(signatures), None) => signatures,
        (None, Some(signature)) => vec![JsonSignature {
            protected: jws.protected,
            signature,
        }],
        (None, None) => Vec::new(),
        (Some(signatures), Some(_)) => return Err(signature_count_error(signatures.len() + 1)),
    };
    if signatures.len() != 1 {
        return Err(signature_count_error(signatures.len()));
    }

    let signature = signatures.remove(0);
    let protected = signature
        .protected
        .ok_or_else(|| AccessError::MalformedToken("missing protected header".into()))?;
    Ok((protected, jws.payload, signature.signature))
}

fn decode_segment<T: DeserializeOwned>(name: &str, segment: &str) -> Result<T, AccessError> {
    let bytes = b64url_decode(segment)
        .map_err(|e| AccessError::MalformedToken(format!("invalid {} encoding: {}", name, e)))?;
    serde_json::from_slice(&bytes).map_err(|e| AccessError::MalformedToken(format!("invalid {}: {}", name, e)))
}
