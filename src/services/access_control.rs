// src/services/access_control.rs
//! Access-control facade.
//!
//! Bundles issuance, verification, granting, publication and resource
//! registration behind one value
//! shared by the HTTP surface, and hosts the revocation extension point.

use crate::error::AccessError;
use crate::models::context::StoredAccessContext;
use crate::models::policy::CreatePolicyResponse;
use crate::services::context_registrar::{ContextRegistrar, RegisterResourceRequest, RegisterResourceResponse};
use crate::models::session::{Role, StoredSession};
use crate::services::policy_publisher::{CreatePolicyRequest, PolicyPublisher};
use crate::services::role_granter::{GrantRoleRequest, GrantRoleResponse, RoleGranter};
use crate::services::session_issuer::{CreateSessionRequest, SessionIssuer};
use crate::services::session_verifier::{SessionVerifier, VerifySessionOutput, VerifySessionRequest};
use crate::storage::auth_storage::AuthStorage;
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use std::sync::Arc;

/// Revokes sessions and roles wherever they are anchored (usually on-chain).
///
/// The service only records the outcome locally; how revocation is carried
/// out is up to the hook.
#[async_trait]
pub trait RevocationHook: Send + Sync {
    async fn revoke_session(&self, session: &StoredSession) -> Result<(), AccessError>;

    async fn revoke_role(&self, role: &Role) -> Result<(), AccessError>;
}

/// The access-control service.
#[derive(Clone)]
pub struct AccessControlService {
    issuer: SessionIssuer,
    verifier: SessionVerifier,
    granter: RoleGranter,
    publisher: PolicyPublisher,
    registrar: ContextRegistrar,
    storage: AuthStorage,
    revocation: Option<Arc<dyn RevocationHook>>,
}

impl AccessControlService {
    pub fn new(
        issuer: SessionIssuer,
        verifier: SessionVerifier,
        granter: RoleGranter,
        publisher: PolicyPublisher,
        registrar: ContextRegistrar,
        storage: AuthStorage,
    ) -> Self {
        AccessControlService {
            issuer,
            verifier,
            granter,
            publisher,
            registrar,
            storage,
            revocation: None,
        }
    }

    pub fn with_revocation_hook(mut self, hook: Arc<dyn RevocationHook>) -> Self {
        self.revocation = Some(hook);
        self
    }

    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<StoredSession, AccessError> {
        self.issuer.create_session(request).await
    }

    pub async fn verify_session(&self, request: VerifySessionRequest) -> VerifySessionOutput {
        self.verifier.verify_session(request).await
    }

    pub async fn grant_role(&self, request: GrantRoleRequest) -> Result<GrantRoleResponse, AccessError> {
        self.granter.grant_role(request).await
    }

    pub async fn get_role(&self, role_id: &str) -> Result<Role, AccessError> {
        self.granter.get_role(role_id).await
    }

    pub async fn create_policy(&self, request: CreatePolicyRequest) -> Result<CreatePolicyResponse, AccessError> {
        self.publisher.create_policy(request).await
    }

    pub async fn create_access_context(&self) -> Result<StoredAccessContext, AccessError> {
        self.registrar.create_access_context().await
    }

    pub async fn register_resource(&self, request: RegisterResourceRequest) -> Result<RegisterResourceResponse, AccessError> {
        self.registrar.register_resource(request).await
    }

    /// Revokes a stored session through the revocation hook and marks it revoked.
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] when no hook is configured and
    /// [`AccessError::NotFound`] for unknown sessions.
    pub async fn revoke_session(&self, session_id: &str) -> Result<StoredSession, AccessError> {
        let hook = self
            .revocation
            .as_ref()
            .ok_or_else(|| AccessError::Validation("session revocation is not configured".into()))?;
        let mut session = self
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("session {}", session_id)))?;
        if session.revoked {
            return Ok(session);
        }

        hook.revoke_session(&session).await?;

        session.revoked = true;
        session.revoked_at = Some(Utc::now());
        self.storage.update_session(&session).await?;
        info!("revoked session {}", session.id);
        Ok(session)
    }

    /// Revokes a cached role through the revocation hook.
    ///
    /// # Errors
    /// Returns [`AccessError::Validation`] when no hook is configured and
    /// [`AccessError::NotFound`] for unknown roles.
    pub async fn revoke_role(&self, role_id: &str) -> Result<Role, AccessError> {
        let hook = self
            .revocation
            .as_ref()
            .ok_or_else(|| AccessError::Validation("role revocation is not configured".into()))?;
        let role = self.granter.get_role(role_id).await?;
        hook.revoke_role(&role).await?;
        info!("revoked role {} in context {}", role.id, role.context);
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed_token, test_service, TestService};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHook {
        sessions: Mutex<Vec<String>>,
        roles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RevocationHook for RecordingHook {
        async fn revoke_session(&self, session: &StoredSession) -> Result<(), AccessError> {
            self.sessions.lock().unwrap().push(session.id.clone());
            Ok(())
        }

        async fn revoke_role(&self, role: &Role) -> Result<(), AccessError> {
            self.roles.lock().unwrap().push(role.id.clone());
            Ok(())
        }
    }

    fn session_token(t: &TestService, jti: &str) -> String {
        signed_token(
            &t.key,
            "did:example:abc#key-1",
            json!({"iss": "did:example:abc", "sub": "did:example:xyz", "jti": jti}),
        )
    }

    #[tokio::test]
    async fn test_revocation_requires_a_hook() {
        let t = test_service();
        let err = t.service.revoke_session("sess-1").await.unwrap_err();
        assert_eq!(err.to_string(), "invalid request: session revocation is not configured");
        assert!(matches!(t.service.revoke_role("reader").await, Err(AccessError::Validation(_))));
    }

    #[tokio::test]
    async fn test_revoked_session_stops_verifying() {
        let t = test_service();
        let hook = Arc::new(RecordingHook::default());
        let service = t.service.clone().with_revocation_hook(hook.clone());

        let jwt = session_token(&t, "sess-1");
        service.issuer.issue_from_token(&jwt).await.unwrap();
        assert!(service.verify_session(VerifySessionRequest { jwt: jwt.clone(), ..Default::default() }).await.verified);

        let revoked = service.revoke_session("sess-1").await.unwrap();
        assert!(revoked.revoked);
        assert!(revoked.revoked_at.is_some());
        assert_eq!(*hook.sessions.lock().unwrap(), vec!["sess-1".to_string()]);

        let out = service.verify_session(VerifySessionRequest { jwt, ..Default::default() }).await;
        assert!(!out.verified);
    }

    #[tokio::test]
    async fn test_revoking_unknown_entries_is_not_found() {
        let t = test_service();
        let service = t.service.clone().with_revocation_hook(Arc::new(RecordingHook::default()));

        assert!(matches!(service.revoke_session("nope").await, Err(AccessError::NotFound(_))));
        assert!(matches!(service.revoke_role("nope").await, Err(AccessError::NotFound(_))));
    }
}
