// src/models/policy.rs
//! Published policy artifacts.

use serde::{Deserialize, Serialize};

/// Content-addressed locations of the artifacts that make up a policy.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyURISet {
    pub presentation_definition: String,
    pub proof_program: String,
    pub proving_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub verification_key: String,
}

/// Result of a policy publication.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatePolicyResponse {
    /// Address of the policy contract registered in the access context
    pub policy_contract: String,
    pub uris: PolicyURISet,
    /// Hash of the `registerPolicy` transaction
    pub registration_tx: String,
}
