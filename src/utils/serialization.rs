// src/utils/serialization.rs
//! Serialization utilities.
//!
//! Provides:
//! - JSON (de)serialization shorthands
//! - unpadded base64url, the encoding used by every JOSE segment
//! - lenient 256-bit integer parsing for proof values

use ethers_core::types::U256;
use serde::{Deserialize, Deserializer, Serialize};

/// Serializes a value to a JSON string.
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Deserializes a value from a JSON string.
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// Encodes bytes as unpadded base64url.
pub fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Decodes unpadded base64url.
pub fn b64url_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode_config(data, base64::URL_SAFE_NO_PAD)
}

/// Parses a 256-bit integer written either as `0x`-prefixed hex or as decimal.
pub fn parse_u256(value: &str) -> Result<U256, String> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("invalid hex integer {}: {}", value, e)),
        None => U256::from_dec_str(value).map_err(|e| format!("invalid decimal integer {}: {}", value, e)),
    }
}

/// Serde adapter accepting a `U256` as hex string, decimal string or JSON number.
pub fn deserialize_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => parse_u256(&text).map_err(serde::de::Error::custom),
        Raw::Number(n) => Ok(U256::from(n)),
    }
}
