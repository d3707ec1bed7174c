// src/models/proof.rs
//! Groth16-style proof values as the access-context contract expects them.
//!
//! The proof is never interpreted here. It is carried from the request to the
//! ABI encoder unchanged: two G1 points (`a`, `c`), one G2 point (`b`) and a
//! fixed vector of public inputs.

use crate::utils::serialization::{deserialize_u256, parse_u256};
use ethers_core::abi::Token;
use ethers_core::types::U256;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of public inputs every policy verifier takes.
pub const PUBLIC_INPUTS_LEN: usize = 20;

/// A point on the G1 curve.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct G1Point {
    #[serde(deserialize_with = "deserialize_u256")]
    pub x: U256,
    #[serde(deserialize_with = "deserialize_u256")]
    pub y: U256,
}

/// A point on the G2 curve; each coordinate is an element of the extension field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct G2Point {
    #[serde(deserialize_with = "deserialize_pair")]
    pub x: [U256; 2],
    #[serde(deserialize_with = "deserialize_pair")]
    pub y: [U256; 2],
}

/// A succinct proof (A, B, C).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Proof {
    pub a: G1Point,
    pub b: G2Point,
    pub c: G1Point,
}

/// The public inputs of a proof; always exactly [`PUBLIC_INPUTS_LEN`] values.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(transparent)]
pub struct PublicInputs(pub [U256; PUBLIC_INPUTS_LEN]);

impl Default for PublicInputs {
    fn default() -> Self {
        PublicInputs([U256::zero(); PUBLIC_INPUTS_LEN])
    }
}

impl<'de> Deserialize<'de> for PublicInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = deserialize_u256_list(deserializer)?;
        let len = values.len();
        let inputs: [U256; PUBLIC_INPUTS_LEN] = values.try_into().map_err(|_| {
            serde::de::Error::custom(format!("expected {} public inputs, got {}", PUBLIC_INPUTS_LEN, len))
        })?;
        Ok(PublicInputs(inputs))
    }
}

impl G1Point {
    fn to_token(self) -> Token {
        Token::Tuple(vec![Token::Uint(self.x), Token::Uint(self.y)])
    }
}

impl G2Point {
    fn to_token(self) -> Token {
        Token::Tuple(vec![
            Token::FixedArray(self.x.iter().copied().map(Token::Uint).collect()),
            Token::FixedArray(self.y.iter().copied().map(Token::Uint).collect()),
        ])
    }
}

impl Proof {
    /// ABI token for `((uint256,uint256),(uint256[2],uint256[2]),(uint256,uint256))`.
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![self.a.to_token(), self.b.to_token(), self.c.to_token()])
    }
}

impl PublicInputs {
    /// ABI token for `uint256[20]`.
    pub fn to_token(&self) -> Token {
        Token::FixedArray(self.0.iter().copied().map(Token::Uint).collect())
    }
}

fn deserialize_u256_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Vec::<Raw>::deserialize(deserializer)?
        .into_iter()
        .map(|raw| match raw {
            Raw::Text(text) => parse_u256(&text).map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(U256::from(n)),
        })
        .collect()
}

fn deserialize_pair<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[U256; 2], D::Error> {
    let values = deserialize_u256_list(deserializer)?;
    let len = values.len();
    values
        .try_into()
        .map_err(|_| serde::de::Error::custom(format!("expected 2 coordinates, got {}", len)))
}
