//! Persistence boundary for connections.
//!
//! The service codes against [`ConnectionStore`]; `tally-db` provides the
//! SQLite implementation and [`InMemoryConnectionStore`] backs tests and
//! local experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::connection::{Connection, NewConnection};
use crate::provider::BoxError;
use crate::types::{ConnectionId, ProviderId, UserId};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed.
    #[error("connection store error: {0}")]
    Backend(#[source] BoxError),
    /// A stored row could not be read back.
    #[error("corrupt connection record {connection_id}: {message}")]
    Corrupt {
        connection_id: String,
        message: String,
    },
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Connection persistence.
///
/// Ownership is enforced by the filters here: every lookup that takes a
/// [`UserId`] must only ever see that user's rows.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Finds the connection for `(user_id, provider)`.
    async fn find(
        &self,
        user_id: &UserId,
        provider: &ProviderId,
    ) -> Result<Option<Connection>, StoreError>;

    /// Inserts or replaces the connection for `(user_id, provider)` atomically.
    ///
    /// An existing row keeps its id and `last_used_at`; everything else is
    /// overwritten.
    async fn upsert(&self, connection: NewConnection) -> Result<Connection, StoreError>;

    /// Deletes `connection_id` if it belongs to `user_id`.
    ///
    /// Returns whether a row was removed.
    async fn delete(&self, user_id: &UserId, connection_id: &ConnectionId)
    -> Result<bool, StoreError>;

    /// Lists a user's connections ordered by provider.
    async fn list(&self, user_id: &UserId) -> Result<Vec<Connection>, StoreError>;

    /// Records a use of `connection_id`.
    async fn touch(&self, connection_id: &ConnectionId, at: DateTime<Utc>)
    -> Result<(), StoreError>;
}

/// Connection store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    rows: RwLock<HashMap<(UserId, ProviderId), Connection>>,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored connections across all users.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn find(
        &self,
        user_id: &UserId,
        provider: &ProviderId,
    ) -> Result<Option<Connection>, StoreError> {
        let key = (user_id.clone(), provider.clone());
        Ok(self.rows.read().await.get(&key).cloned())
    }

    async fn upsert(&self, connection: NewConnection) -> Result<Connection, StoreError> {
        let mut guard = self.rows.write().await;
        let key = (connection.user_id.clone(), connection.provider.clone());
        let (id, last_used_at) = guard.get(&key).map_or_else(
            || (ConnectionId::generate(), None),
            |existing| (existing.id.clone(), existing.last_used_at),
        );
        let stored = Connection {
            id,
            user_id: connection.user_id,
            provider: connection.provider,
            encrypted_token: connection.encrypted_token,
            label: connection.label,
            metadata: connection.metadata,
            connected_at: connection.connected_at,
            last_used_at,
        };
        guard.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        user_id: &UserId,
        connection_id: &ConnectionId,
    ) -> Result<bool, StoreError> {
        let mut guard = self.rows.write().await;
        let key = guard
            .iter()
            .find(|(_, row)| &row.user_id == user_id && &row.id == connection_id)
            .map(|(key, _)| key.clone());
        Ok(key.is_some_and(|key| guard.remove(&key).is_some()))
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<Connection>, StoreError> {
        let guard = self.rows.read().await;
        let mut rows: Vec<Connection> = guard
            .values()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(rows)
    }

    async fn touch(&self, connection_id: &ConnectionId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.rows.write().await;
        if let Some(row) = guard.values_mut().find(|row| &row.id == connection_id) {
            row.last_used_at = Some(at);
        }
        Ok(())
    }
}
