// src/models/session.rs
//! Session and role records kept in the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A session whose token signature has been verified against the issuer's DID.
///
/// Created only by session issuance; `id` is the token's own `jti`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub id: String,
    pub issuer: String,
    pub subject: String,
    #[serde(default)]
    pub audience: Vec<String>,
    /// The original signed token, kept for re-verification and audit
    #[serde(rename = "token", default, skip_serializing_if = "String::is_empty")]
    pub session_token: String,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    /// Whether the session is flagged expired or its expiry lies at or before `now`.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expires_at.map_or(false, |expires_at| expires_at <= now)
    }
}

/// A role granted on-chain and cached locally.
///
/// Persisted only after the grant-role transaction was accepted by the node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    /// Id of the role that identifies it within the context.
    pub id: String,
    /// Access context of the role.
    pub context: String,
    /// `<context hash>+<role hash>` as used on-chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl Role {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.context.is_empty()
    }
}
