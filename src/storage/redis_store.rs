// src/storage/redis_store.rs
//! Redis [`ServiceStorage`] backend.
//!
//! Records live under `<namespace>:<key>`. `SET` is atomic per key, and
//! conditional writes use `SET NX`.

use super::{ServiceStorage, StorageError};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::sync::Arc;

/// Redis-backed storage sharing one client across services.
#[derive(Clone)]
pub struct RedisStorage {
    client: Arc<redis::Client>,
}

impl RedisStorage {
    /// Opens a client for `redis_url`; connections are established lazily.
    ///
    /// # Errors
    /// Returns error if the URL is malformed.
    pub fn open(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client: Arc::new(client) })
    }

    fn record_key(namespace: &str, key: &str) -> String {
        format!("{}:{}", namespace, key)
    }
}

#[async_trait]
impl ServiceStorage for RedisStorage {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<Vec<u8>> = conn.get(Self::record_key(namespace, key)).await?;
        Ok(value)
    }

    async fn write(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set::<_, _, ()>(Self::record_key(namespace, key), value).await?;
        Ok(())
    }

    async fn write_if_absent(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let created: bool = redis::cmd("SET")
            .arg(Self::record_key(namespace, key))
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(created)
    }
}
