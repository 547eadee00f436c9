use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::{
    Connection, ConnectionId, ConnectionStore, NewConnection, ProviderId, StoreError, UserId,
};

use crate::{Database, DbError};

/// [`ConnectionStore`] backed by a SQLite [`Database`].
///
/// Queries are short and local, so they run inline on the calling task
/// while holding the lock.
pub struct SqliteConnectionStore {
    db: Mutex<Database>,
}

impl SqliteConnectionStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        Database::open(path).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Database::open_in_memory().map(Self::new)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::backend(DbError::LockPoisoned))
    }
}

fn store_error(err: DbError) -> StoreError {
    match err.connection_id() {
        Some(connection_id) => StoreError::Corrupt {
            connection_id: connection_id.to_string(),
            message: err.to_string(),
        },
        None => StoreError::backend(err),
    }
}

#[async_trait]
impl ConnectionStore for SqliteConnectionStore {
    async fn find(
        &self,
        user_id: &UserId,
        provider: &ProviderId,
    ) -> Result<Option<Connection>, StoreError> {
        self.lock()?
            .find_connection(user_id, provider)
            .map_err(store_error)
    }

    async fn upsert(&self, connection: NewConnection) -> Result<Connection, StoreError> {
        let stored = self
            .lock()?
            .upsert_connection(&connection, &ConnectionId::generate())
            .map_err(store_error)?;
        tracing::debug!(
            connection_id = %stored.id,
            provider = %stored.provider,
            "stored connection"
        );
        Ok(stored)
    }

    async fn delete(
        &self,
        user_id: &UserId,
        connection_id: &ConnectionId,
    ) -> Result<bool, StoreError> {
        self.lock()?
            .delete_connection(user_id, connection_id)
            .map_err(store_error)
    }

    async fn list(&self, user_id: &UserId) -> Result<Vec<Connection>, StoreError> {
        self.lock()?.list_connections(user_id).map_err(store_error)
    }

    async fn touch(&self, connection_id: &ConnectionId, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.lock()?
            .touch_connection(connection_id, at)
            .map_err(store_error)
    }
}
