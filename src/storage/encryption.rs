// src/storage/encryption.rs
//! Encryption at rest for stored records.
//!
//! Ciphertext layout produced by [`AesGcmEncrypter`]:
//! ```text
//! nonce (12 bytes) || AES-256-GCM ciphertext || tag (16 bytes)
//! ```

use super::StorageError;
use async_trait::async_trait;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Encrypts records before they are written and decrypts them after they are read.
#[async_trait]
pub trait Encrypter: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError>;
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StorageError>;
}

/// Pass-through encrypter for non-production setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEncrypter;

#[async_trait]
impl Encrypter for NoopEncrypter {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(plaintext.to_vec())
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StorageError> {
        Ok(ciphertext.to_vec())
    }
}

/// AES-256-GCM encrypter keyed by a 32-byte service key.
pub struct AesGcmEncrypter {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmEncrypter {
    /// Creates an encrypter from raw key bytes.
    ///
    /// # Errors
    /// Returns error if the key is not 32 bytes long.
    pub fn new(key: &[u8]) -> Result<Self, StorageError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| StorageError::Encryption(format!("expected a 32 byte key, got {} bytes", key.len())))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Creates an encrypter from a hex-encoded key (with or without 0x prefix).
    pub fn from_hex(key: &str) -> Result<Self, StorageError> {
        let bytes = ethers_core::utils::hex::decode(key.trim_start_matches("0x"))
            .map_err(|e| StorageError::Encryption(format!("invalid hex key: {}", e)))?;
        Self::new(&bytes)
    }
}

#[async_trait]
impl Encrypter for AesGcmEncrypter {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| StorageError::Encryption("system rng failed".into()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::Encryption("seal failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StorageError> {
        if ciphertext.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(StorageError::Decryption("ciphertext too short".into()));
        }
        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| StorageError::Decryption("bad nonce".into()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| StorageError::Decryption("authentication failed".into()))?;
        Ok(plaintext.to_vec())
    }
}
