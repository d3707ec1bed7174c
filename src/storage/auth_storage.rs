// src/storage/auth_storage.rs
//! Typed storage for sessions, roles, policy deployments and access contexts.
//!
//! Session records are encrypted before they are written and decrypted after
//! they are read. Role, policy and context records are plain JSON.

use super::encryption::{Encrypter, NoopEncrypter};
use super::{ServiceStorage, StorageError};
use crate::models::context::StoredAccessContext;
use crate::models::session::{Role, StoredSession};
use std::sync::Arc;

pub const SESSION_NAMESPACE: &str = "session";
pub const ROLE_NAMESPACE: &str = "role";
pub const POLICY_NAMESPACE: &str = "policy";
pub const CONTEXT_NAMESPACE: &str = "context";

/// Outcome of a conditional session insert.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInsert {
    /// This call created the record.
    Created,
    /// A record with the same id already existed and was left untouched.
    Existing(StoredSession),
}

/// Storage facade used by the access-control services.
#[derive(Clone)]
pub struct AuthStorage {
    db: Arc<dyn ServiceStorage>,
    encrypter: Arc<dyn Encrypter>,
}

impl AuthStorage {
    /// Wraps a backend; a missing encrypter means records are stored as-is.
    pub fn new(db: Arc<dyn ServiceStorage>, encrypter: Option<Arc<dyn Encrypter>>) -> Self {
        Self {
            db,
            encrypter: encrypter.unwrap_or_else(|| Arc::new(NoopEncrypter)),
        }
    }

    /// Stores a session under its id unless one is already there.
    ///
    /// # Errors
    /// Returns error if the session has no id, or on serialization, encryption
    /// or backend failure. Nothing is written in any error case.
    pub async fn insert_session(&self, session: &StoredSession) -> Result<SessionInsert, StorageError> {
        if session.id.is_empty() {
            return Err(StorageError::InvalidRecord("could not store session without an ID".into()));
        }
        let sealed = self.seal_session(session).await?;

        if self.db.write_if_absent(SESSION_NAMESPACE, &session.id, sealed).await? {
            return Ok(SessionInsert::Created);
        }
        match self.get_session(&session.id).await? {
            Some(existing) => Ok(SessionInsert::Existing(existing)),
            None => Err(StorageError::Backend(format!("session <{}> vanished during insert", session.id))),
        }
    }

    /// Replaces an existing session record.
    pub async fn update_session(&self, session: &StoredSession) -> Result<(), StorageError> {
        if session.id.is_empty() {
            return Err(StorageError::InvalidRecord("could not store session without an ID".into()));
        }
        let sealed = self.seal_session(session).await?;
        self.db.write(SESSION_NAMESPACE, &session.id, sealed).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<StoredSession>, StorageError> {
        let Some(sealed) = self.db.read(SESSION_NAMESPACE, id).await? else {
            return Ok(None);
        };
        let plaintext = self.encrypter.decrypt(&sealed).await?;
        Ok(Some(serde_json::from_slice(&plaintext)?))
    }

    /// Stores a granted role under its role id.
    pub async fn insert_role(&self, role: &Role) -> Result<(), StorageError> {
        if !role.is_valid() {
            return Err(StorageError::InvalidRecord(format!("could not store role <{}>", role.id)));
        }
        let data = serde_json::to_vec(role)?;
        self.db.write(ROLE_NAMESPACE, &role.id, data).await
    }

    pub async fn get_role(&self, id: &str) -> Result<Option<Role>, StorageError> {
        match self.db.read(ROLE_NAMESPACE, id).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Remembers which contract was deployed for a policy deployment key.
    pub async fn record_policy_contract(&self, deployment_key: &str, contract: &str) -> Result<(), StorageError> {
        self.db
            .write(POLICY_NAMESPACE, deployment_key, contract.as_bytes().to_vec())
            .await
    }

    pub async fn get_policy_contract(&self, deployment_key: &str) -> Result<Option<String>, StorageError> {
        match self.db.read(POLICY_NAMESPACE, deployment_key).await? {
            Some(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| StorageError::InvalidRecord(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn access_context_exists(&self, id: &str) -> Result<bool, StorageError> {
        self.db.exists(CONTEXT_NAMESPACE, id).await
    }

    pub async fn get_access_context(&self, id: &str) -> Result<Option<StoredAccessContext>, StorageError> {
        match self.db.read(CONTEXT_NAMESPACE, id).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Stores an access context; the first record for an id wins.
    pub async fn insert_access_context(&self, context: &StoredAccessContext) -> Result<(), StorageError> {
        if context.id.is_empty() || context.address.is_empty() {
            return Err(StorageError::InvalidRecord("access context needs an id and an address".into()));
        }
        let data = serde_json::to_vec(context)?;
        self.db.write_if_absent(CONTEXT_NAMESPACE, &context.id, data).await?;
        Ok(())
    }

    async fn seal_session(&self, session: &StoredSession) -> Result<Vec<u8>, StorageError> {
        let plaintext = serde_json::to_vec(session)?;
        self.encrypter.encrypt(&plaintext).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::encryption::AesGcmEncrypter;
    use crate::storage::kv::MemoryStorage;
    use chrono::Utc;

    fn session(id: &str, subject: &str) -> StoredSession {
        StoredSession {
            id: id.into(),
            issuer: "did:example:abc".into(),
            subject: subject.into(),
            audience: vec!["svc".into()],
            session_token: "a.b.c".into(),
            created_at: Utc::now(),
            revoked: false,
            revoked_at: None,
            expired: false,
            expires_at: None,
        }
    }

    fn encrypted_storage(db: &MemoryStorage) -> AuthStorage {
        let encrypter = AesGcmEncrypter::new(&[9u8; 32]).unwrap();
        AuthStorage::new(Arc::new(db.clone()), Some(Arc::new(encrypter)))
    }

    #[tokio::test]
    async fn test_sessions_are_encrypted_at_rest() {
        let db = MemoryStorage::new();
        let storage = encrypted_storage(&db);
        storage.insert_session(&session("sess-1", "did:example:xyz")).await.unwrap();

        let raw = db.read(SESSION_NAMESPACE, "sess-1").await.unwrap().unwrap();
        assert!(serde_json::from_slice::<StoredSession>(&raw).is_err());

        let loaded = storage.get_session("sess-1").await.unwrap().unwrap();
        assert_eq!(loaded.subject, "did:example:xyz");
    }

    #[tokio::test]
    async fn test_second_insert_returns_existing_record() {
        let db = MemoryStorage::new();
        let storage = encrypted_storage(&db);

        let first = session("sess-1", "did:example:first");
        assert_eq!(storage.insert_session(&first).await.unwrap(), SessionInsert::Created);

        match storage.insert_session(&session("sess-1", "did:example:second")).await.unwrap() {
            SessionInsert::Existing(existing) => assert_eq!(existing, first),
            other => panic!("unexpected insert outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_without_id_is_rejected() {
        let db = MemoryStorage::new();
        let storage = AuthStorage::new(Arc::new(db.clone()), None);
        tokio_test::assert_err!(storage.insert_session(&session("", "s")).await);
        assert_eq!(db.count(SESSION_NAMESPACE).await, 0);
    }

    #[tokio::test]
    async fn test_roles_and_policy_contracts_round_trip() {
        let storage = AuthStorage::new(Arc::new(MemoryStorage::new()), None);
        let role = Role { id: "reader".into(), context: "ctx".into(), identifier: None };

        storage.insert_role(&role).await.unwrap();
        assert_eq!(storage.get_role("reader").await.unwrap(), Some(role));
        assert_eq!(storage.get_role("writer").await.unwrap(), None);

        storage.record_policy_contract("k", "0xabc").await.unwrap();
        assert_eq!(storage.get_policy_contract("k").await.unwrap().as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_first_access_context_wins() {
        let storage = AuthStorage::new(Arc::new(MemoryStorage::new()), None);
        let first = StoredAccessContext { id: "0x01".into(), address: "0xaa".into() };
        let second = StoredAccessContext { id: "0x01".into(), address: "0xbb".into() };

        assert!(!storage.access_context_exists("0x01").await.unwrap());
        storage.insert_access_context(&first).await.unwrap();
        storage.insert_access_context(&second).await.unwrap();

        assert!(storage.access_context_exists("0x01").await.unwrap());
        assert_eq!(storage.get_access_context("0x01").await.unwrap(), Some(first));
        tokio_test::assert_err!(
            storage
                .insert_access_context(&StoredAccessContext { id: String::new(), address: "0xaa".into() })
                .await
        );
    }
}
