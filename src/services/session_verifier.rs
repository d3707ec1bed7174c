// src/services/session_verifier.rs
//! Session verification.
//!
//! A session is verified when it is in the local store, or when the chain
//! knows it and its token passes full issuance, which also caches it. Every
//! failure yields `verified == false` with a reason; nothing is retried and no
//! error escapes.

use crate::blockchain::gateway::ChainGateway;
use crate::error::AccessError;
use crate::models::session::StoredSession;
use crate::services::session_issuer::SessionIssuer;
use crate::storage::auth_storage::AuthStorage;
use crate::token::ParsedToken;
use crate::utils::crypto::hash_str;
use crate::wallet::Wallet;
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_REVOKED: &str = "session revoked";
pub const SESSION_EXPIRED: &str = "session expired";
pub const INVALID_AUTHORIZATION: &str = "invalid authorization";

/// Request of [`SessionVerifier::verify_session`].
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VerifySessionRequest {
    /// Signed session token presented by the bearer
    pub jwt: String,
    /// Role the session subject must hold, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Access context of `role`; the service wallet's DID when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

/// Outcome of a verification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VerifySessionOutput {
    pub verified: bool,
    /// The session token that was checked
    pub jwt: String,
    /// Why the session was not verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Decides whether a presented session token is currently authorized.
#[derive(Clone)]
pub struct SessionVerifier {
    storage: AuthStorage,
    issuer: SessionIssuer,
    chain: Arc<dyn ChainGateway>,
    wallet: Arc<Wallet>,
}

impl SessionVerifier {
    pub fn new(storage: AuthStorage, issuer: SessionIssuer, chain: Arc<dyn ChainGateway>, wallet: Arc<Wallet>) -> Self {
        SessionVerifier {
            storage,
            issuer,
            chain,
            wallet,
        }
    }

    /// Verifies a session token.
    ///
    /// Lookup order:
    /// 1. local store: a stored session passed signature verification when it was issued
    /// 2. chain: `isSession(keccak(jti), keccak(wallet DID))`
    /// 3. full issuance of the presented token, which caches it on success
    ///
    /// When a role is requested, the verified session's subject must hold it.
    ///
    /// The cache fill runs inside this future; dropping the future before it
    /// completes leaves the store untouched.
    pub async fn verify_session(&self, request: VerifySessionRequest) -> VerifySessionOutput {
        match self.verify(&request).await {
            Ok(session) => {
                debug!("session {} verified", session.id);
                VerifySessionOutput {
                    verified: true,
                    jwt: request.jwt,
                    reason: None,
                }
            }
            Err(reason) => {
                debug!("session not verified: {}", reason);
                VerifySessionOutput {
                    verified: false,
                    jwt: request.jwt,
                    reason: Some(reason),
                }
            }
        }
    }

    async fn verify(&self, request: &VerifySessionRequest) -> Result<StoredSession, String> {
        let token = ParsedToken::parse(&request.jwt).map_err(|e| e.to_string())?;
        let jti = token.jti().map_err(|e| e.to_string())?;

        let session = match self.storage.get_session(jti).await {
            Ok(Some(session)) => session,
            Ok(None) => self.fill_from_chain(&request.jwt, jti).await.map_err(|e| e.to_string())?,
            Err(e) => {
                warn!("could not read session {}: {}", jti, e);
                return Err(AccessError::from(e).to_string());
            }
        };

        if session.revoked {
            return Err(SESSION_REVOKED.to_string());
        }
        if session.has_expired(Utc::now()) {
            self.mark_expired(session).await;
            return Err(SESSION_EXPIRED.to_string());
        }

        if let Some(role) = request.role.as_deref().filter(|role| !role.is_empty()) {
            let context = request
                .context_id
                .as_deref()
                .filter(|context| !context.is_empty())
                .unwrap_or_else(|| self.wallet.did());
            let granted = self
                .chain
                .has_role(hash_str(context), hash_str(role), hash_str(&session.subject))
                .await
                .map_err(|e| e.to_string())?;
            if !granted {
                return Err(INVALID_AUTHORIZATION.to_string());
            }
        }

        Ok(session)
    }

    /// Records the expiry so later lookups see the flag; failures only cost that.
    async fn mark_expired(&self, mut session: StoredSession) {
        if session.expired {
            return;
        }
        session.expired = true;
        if let Err(e) = self.storage.update_session(&session).await {
            warn!("could not mark session {} expired: {}", session.id, e);
        }
    }

    async fn fill_from_chain(&self, jwt: &str, jti: &str) -> Result<StoredSession, AccessError> {
        let exists = self.chain.is_session(hash_str(jti), self.wallet.did_hash()).await?;
        if !exists {
            return Err(AccessError::NotFound("session id".to_string()));
        }
        debug!("session {} found on-chain, verifying token", jti);
        self.issuer.issue_from_token(jwt).await
    }
}
