// src/models/did.rs
//! Decentralized Identifier (DID) document model.
//!
//! Only the parts needed to verify a session token are modelled: the document
//! id and its verification methods with their public key material, following
//! the [DID Core Specification](https://www.w3.org/TR/did-core/).

use serde::{Deserialize, Serialize};

/// A resolved DID document.
///
/// # DID Format
/// The `id` field follows DID syntax:
/// ```text
/// did:<method>:<method-specific-id>
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DIDDocument {
    /// The complete DID string identifier
    /// Example: "did:example:123456789abcdefghi"
    pub id: String,

    /// Keys the DID subject controls
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,

    /// URI for interacting with the DID subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,
}

/// One verification method of a DID document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// DID URL of the method, usually `<did>#<fragment>`
    pub id: String,

    #[serde(rename = "type")]
    pub method_type: String,

    #[serde(default)]
    pub controller: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicKeyJwk>,

    /// SEC1 encoded key, compressed or uncompressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
}

/// An elliptic-curve public key in JWK form.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl DIDDocument {
    /// Finds the verification method addressed by `kid`.
    ///
    /// `kid` may be the full DID URL (`did:example:abc#key-1`), a relative
    /// reference (`#key-1`) or the bare fragment (`key-1`).
    pub fn find_verification_method(&self, kid: &str) -> Option<&VerificationMethod> {
        let fragment = kid.rsplit_once('#').map(|(_, f)| f).unwrap_or(kid);
        self.verification_method.iter().find(|vm| {
            vm.id == kid || vm.id.rsplit_once('#').map(|(_, f)| f == fragment).unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> DIDDocument {
        serde_json::from_value(serde_json::json!({
            "id": "did:example:abc",
            "verificationMethod": [{
                "id": "did:example:abc#key-1",
                "type": "JsonWebKey2020",
                "controller": "did:example:abc",
                "publicKeyJwk": { "kty": "EC", "crv": "secp256k1", "x": "AA", "y": "AA" }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_find_verification_method_by_any_kid_form() {
        let doc = document();
        assert!(doc.find_verification_method("did:example:abc#key-1").is_some());
        assert!(doc.find_verification_method("#key-1").is_some());
        assert!(doc.find_verification_method("key-1").is_some());
        assert!(doc.find_verification_method("did:example:abc#key-2").is_none());
    }
}
