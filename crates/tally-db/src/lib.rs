//! Storage layer for tally connections.
//!
//! Provides persistence for provider connections using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! [`SqliteConnectionStore`] serializes access through a `Mutex<Database>` so one
//! store can back a shared [`ConnectionService`](tally_core::ConnectionService).
//!
//! # Schema
//!
//! One row per `(user_id, provider)`; the unique constraint is what makes
//! reconnecting replace rather than duplicate. Timestamps are stored as TEXT
//! in RFC 3339 with millisecond precision, always UTC. `metadata` holds the
//! provider profile as a JSON object. `encrypted_token` is the base64 blob
//! produced by [`Cipher`](tally_core::Cipher); plaintext never reaches this crate.

mod store;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection as SqliteConnection, OptionalExtension, Row, params};
use tally_core::{
    Connection, ConnectionId, ConnectionMetadata, EncryptedToken, NewConnection, ProviderId,
    UserId,
};
use thiserror::Error;

pub use store::SqliteConnectionStore;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for connection {connection_id}: {timestamp}")]
    TimestampParse {
        connection_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The metadata column is not a JSON object.
    #[error("invalid metadata for connection {connection_id}: {source}")]
    InvalidMetadata {
        connection_id: String,
        #[source]
        source: serde_json::Error,
    },
    /// A column holds a value the domain types reject.
    #[error("invalid connection record {connection_id}: {message}")]
    InvalidRecord {
        connection_id: String,
        message: String,
    },
    /// A previous holder of the database lock panicked.
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl DbError {
    /// The connection a decoding error refers to, if any.
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Self::TimestampParse { connection_id, .. }
            | Self::InvalidMetadata { connection_id, .. }
            | Self::InvalidRecord { connection_id, .. } => Some(connection_id),
            Self::Sqlite(_) | Self::LockPoisoned => None,
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: SqliteConnection,
}

/// A connection row as stored, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConnectionRow {
    id: String,
    user_id: String,
    provider: String,
    encrypted_token: String,
    label: String,
    metadata: String,
    connected_at: String,
    last_used_at: Option<String>,
}

const CONNECTION_COLUMNS: &str =
    "id, user_id, provider, encrypted_token, label, metadata, connected_at, last_used_at";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = SqliteConnection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = SqliteConnection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- connections: one provider token per user and provider
            -- encrypted_token: base64(nonce || tag || ciphertext)
            -- metadata: JSON object with the provider profile
            CREATE TABLE IF NOT EXISTS connections (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                encrypted_token TEXT NOT NULL,
                label TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                connected_at TEXT NOT NULL,
                last_used_at TEXT,
                UNIQUE (user_id, provider)
            );

            CREATE INDEX IF NOT EXISTS idx_connections_user ON connections(user_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts or replaces the connection for `(user_id, provider)`.
    ///
    /// `new_id` is only used when no row exists yet. A replaced row keeps its
    /// id and `last_used_at`.
    pub fn upsert_connection(
        &mut self,
        connection: &NewConnection,
        new_id: &ConnectionId,
    ) -> Result<Connection, DbError> {
        let metadata = serde_json::to_string(&connection.metadata).map_err(|source| {
            DbError::InvalidMetadata {
                connection_id: new_id.to_string(),
                source,
            }
        })?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO connections (id, user_id, provider, encrypted_token, label, metadata, connected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                encrypted_token = excluded.encrypted_token,
                label = excluded.label,
                metadata = excluded.metadata,
                connected_at = excluded.connected_at
            ",
            params![
                new_id.as_str(),
                connection.user_id.as_str(),
                connection.provider.as_str(),
                connection.encrypted_token.as_str(),
                connection.label,
                metadata,
                format_timestamp(connection.connected_at),
            ],
        )?;
        let row = tx.query_row(
            &format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections WHERE user_id = ? AND provider = ?"
            ),
            params![connection.user_id.as_str(), connection.provider.as_str()],
            read_row,
        )?;
        tx.commit()?;
        row.into_connection()
    }

    /// Finds the connection for `(user_id, provider)`.
    pub fn find_connection(
        &self,
        user_id: &UserId,
        provider: &ProviderId,
    ) -> Result<Option<Connection>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CONNECTION_COLUMNS} FROM connections WHERE user_id = ? AND provider = ?"
                ),
                params![user_id.as_str(), provider.as_str()],
                read_row,
            )
            .optional()?;
        row.map(ConnectionRow::into_connection).transpose()
    }

    /// Deletes `connection_id` if it belongs to `user_id`.
    pub fn delete_connection(
        &self,
        user_id: &UserId,
        connection_id: &ConnectionId,
    ) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM connections WHERE id = ? AND user_id = ?",
            params![connection_id.as_str(), user_id.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Lists a user's connections ordered by provider.
    pub fn list_connections(&self, user_id: &UserId) -> Result<Vec<Connection>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE user_id = ? ORDER BY provider"
        ))?;
        let rows = stmt.query_map(params![user_id.as_str()], read_row)?;
        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?.into_connection()?);
        }
        Ok(connections)
    }

    /// Sets `last_used_at` for `connection_id`.
    pub fn touch_connection(
        &self,
        connection_id: &ConnectionId,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE connections SET last_used_at = ? WHERE id = ?",
            params![format_timestamp(at), connection_id.as_str()],
        )?;
        Ok(())
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok(ConnectionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: row.get(2)?,
        encrypted_token: row.get(3)?,
        label: row.get(4)?,
        metadata: row.get(5)?,
        connected_at: row.get(6)?,
        last_used_at: row.get(7)?,
    })
}

impl ConnectionRow {
    fn into_connection(self) -> Result<Connection, DbError> {
        let invalid = |message: String| DbError::InvalidRecord {
            connection_id: self.id.clone(),
            message,
        };
        let id = ConnectionId::new(self.id.clone()).map_err(|err| invalid(err.to_string()))?;
        let user_id = UserId::new(self.user_id.clone()).map_err(|err| invalid(err.to_string()))?;
        let provider =
            ProviderId::new(self.provider.clone()).map_err(|err| invalid(err.to_string()))?;
        let metadata: ConnectionMetadata =
            serde_json::from_str(&self.metadata).map_err(|source| DbError::InvalidMetadata {
                connection_id: self.id.clone(),
                source,
            })?;
        let connected_at = parse_timestamp(&self.connected_at, &self.id)?;
        let last_used_at = self
            .last_used_at
            .as_deref()
            .map(|timestamp| parse_timestamp(timestamp, &self.id))
            .transpose()?;

        Ok(Connection {
            id,
            user_id,
            provider,
            encrypted_token: EncryptedToken::from_stored(self.encrypted_token),
            label: self.label,
            metadata,
            connected_at,
            last_used_at,
        })
    }
}

fn parse_timestamp(timestamp: &str, connection_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            connection_id: connection_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
