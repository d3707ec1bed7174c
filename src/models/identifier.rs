// src/models/identifier.rs
//! Composite identifiers shared by the contracts and the local cache.
//!
//! Both halves are Keccak-256 hashes of human readable strings, so the same
//! `(context, name)` pair always addresses the same on-chain entry and the
//! same cache key.

use crate::utils::crypto::hash_str;
use ethers_core::types::H256;
use std::fmt;

/// Identifies a role within an access context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleIdentifier {
    pub context_id: H256,
    pub role_id: H256,
}

impl RoleIdentifier {
    pub fn new(context_id: &str, role_id: &str) -> Self {
        RoleIdentifier {
            context_id: hash_str(context_id),
            role_id: hash_str(role_id),
        }
    }
}

impl fmt::Display for RoleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.context_id, self.role_id)
    }
}

/// Identifies a policy within an access context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyIdentifier {
    pub context_id: H256,
    pub policy_id: H256,
}

impl PolicyIdentifier {
    pub fn new(context_id: &str, policy_id: &str) -> Self {
        PolicyIdentifier {
            context_id: hash_str(context_id),
            policy_id: hash_str(policy_id),
        }
    }
}

impl fmt::Display for PolicyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}+{:#x}", self.context_id, self.policy_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_deterministic() {
        let a = RoleIdentifier::new("ctx", "reader");
        let b = RoleIdentifier::new("ctx", "reader");
        assert_eq!(a, b);
        assert_ne!(a, RoleIdentifier::new("ctx", "writer"));
        assert_eq!(a.context_id, PolicyIdentifier::new("ctx", "p").context_id);
    }

    #[test]
    fn test_display_uses_prefixed_hashes() {
        let rendered = PolicyIdentifier::new("ctx", "p").to_string();
        let (ctx, policy) = rendered.split_once('+').unwrap();
        assert!(ctx.starts_with("0x") && ctx.len() == 66);
        assert!(policy.starts_with("0x") && policy.len() == 66);
    }
}
