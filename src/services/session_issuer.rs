// src/services/session_issuer.rs
//! Session issuance.
//!
//! A trusted relayer watching the chain forwards each started session as a JWE
//! wrapping the DID-signed session token. Issuance decrypts it, verifies the
//! token against the issuer's DID document and caches the session locally.
//! Nothing is stored unless the signature verified.

use crate::error::AccessError;
use crate::models::session::StoredSession;
use crate::services::did_resolver::DidResolver;
use crate::services::keystore::KeyStore;
use crate::storage::auth_storage::{AuthStorage, SessionInsert};
use crate::token::jwe;
use crate::token::signature::verify_token_signature;
use crate::token::ParsedToken;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request of [`SessionIssuer::create_session`].
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateSessionRequest {
    /// Compact JWE wrapping the signed session token
    #[serde(alias = "session_jwe")]
    pub jwe: String,
}

/// Verifies session tokens and stores them as [`StoredSession`]s.
#[derive(Clone)]
pub struct SessionIssuer {
    storage: AuthStorage,
    keystore: Arc<dyn KeyStore>,
    resolver: Arc<dyn DidResolver>,
    session_key_id: String,
}

impl SessionIssuer {
    /// Creates the issuer.
    ///
    /// # Arguments
    /// * `storage` - Encrypted session store
    /// * `keystore` - Source of the JWE content key
    /// * `resolver` - DID resolution for token issuers
    /// * `session_key_id` - Key store id of the JWE content key
    pub fn new(
        storage: AuthStorage,
        keystore: Arc<dyn KeyStore>,
        resolver: Arc<dyn DidResolver>,
        session_key_id: impl Into<String>,
    ) -> Self {
        SessionIssuer {
            storage,
            keystore,
            resolver,
            session_key_id: session_key_id.into(),
        }
    }

    /// Decrypts, verifies and stores a session.
    ///
    /// # Returns
    /// The stored session, or the already stored one when the session id was
    /// issued before.
    ///
    /// # Errors
    /// - [`AccessError::Validation`] for an empty JWE, before any key lookup
    /// - [`AccessError::Decryption`] when the key is unavailable or decryption fails
    /// - [`AccessError::MalformedToken`] and [`AccessError::SignatureVerification`]
    ///   from [`SessionIssuer::issue_from_token`]
    /// - [`AccessError::SessionExpired`] when the token's `exp` has passed
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<StoredSession, AccessError> {
        if request.jwe.trim().is_empty() {
            return Err(AccessError::Validation("session JWE is required".into()));
        }

        let token = self.decrypt(request.jwe.trim()).await?;
        self.issue_from_token(&token).await
    }

    /// Verifies a signed session token and stores it.
    ///
    /// Used directly after decryption and by session verification to fill the
    /// local cache for sessions only known on-chain.
    pub async fn issue_from_token(&self, token: &str) -> Result<StoredSession, AccessError> {
        let parsed = ParsedToken::parse(token)?;
        let kid = parsed.kid()?;
        let issuer = parsed.issuer()?;

        let document = self
            .resolver
            .resolve(issuer)
            .await
            .map_err(|e| AccessError::signature(issuer, kid, e))?;
        verify_token_signature(&parsed, &document)?;

        let session = build_session(&parsed)?;
        if session.has_expired(Utc::now()) {
            debug!("rejected session {}: token expired", session.id);
            return Err(AccessError::SessionExpired);
        }
        match self.storage.insert_session(&session).await? {
            SessionInsert::Created => {
                info!("stored session {} issued by {}", session.id, session.issuer);
                Ok(session)
            }
            SessionInsert::Existing(existing) => {
                debug!("session {} was already stored", existing.id);
                Ok(existing)
            }
        }
    }

    async fn decrypt(&self, jwe_token: &str) -> Result<String, AccessError> {
        let header = jwe::peek_header(jwe_token)?;
        if let Some(kid) = header.kid.as_deref() {
            if kid != self.session_key_id {
                return Err(AccessError::Decryption(format!(
                    "JWE addressed to key {}, expected {}",
                    kid, self.session_key_id
                )));
            }
        }

        let key = self
            .keystore
            .get_key(&self.session_key_id)
            .await
            .map_err(|e| AccessError::Decryption(format!("could not get key {}: {}", self.session_key_id, e)))?;
        let plaintext = jwe::decrypt_compact(jwe_token, &key, &self.session_key_id)?;

        String::from_utf8(plaintext).map_err(|e| AccessError::Decryption(format!("payload is not UTF-8: {}", e)))
    }
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Session record for a verified token.
fn build_session(token: &ParsedToken) -> Result<StoredSession, AccessError> {
    let claims = &token.claims;
    Ok(StoredSession {
        id: token.jti()?.to_string(),
        issuer: token.issuer()?.to_string(),
        subject: claims.sub.clone().unwrap_or_default(),
        audience: claims.aud.clone(),
        session_token: token.raw.clone(),
        created_at: claims.iat.and_then(timestamp).unwrap_or_else(Utc::now),
        revoked: false,
        revoked_at: None,
        expired: false,
        expires_at: claims.exp.and_then(timestamp),
    })
}
