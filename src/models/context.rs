// src/models/context.rs
//! Access-context record kept in the local store.

use serde::{Deserialize, Serialize};

/// An access-context instance owned by the service wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredAccessContext {
    /// Context id as `0x`-prefixed hex (the wallet DID hash)
    pub id: String,
    /// Checksummed address of the instance
    pub address: String,
}
