//! Stored connections between a user and a provider.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cipher::EncryptedToken;
use crate::types::{ConnectionId, ProviderId, UserId};

/// Provider-supplied profile data, stored verbatim.
///
/// The map is schemaless because providers disagree on what they expose, but
/// every provider fills in the keys below when it knows them:
///
/// | key | meaning |
/// |-----|---------|
/// | `external_id` | the user's id at the provider |
/// | `email` | the account e-mail |
/// | `name` | the display name |
/// | `default_workspace_id` | the workspace the provider opens by default |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionMetadata(BTreeMap<String, Value>);

impl ConnectionMetadata {
    pub const EXTERNAL_ID: &'static str = "external_id";
    pub const EMAIL: &'static str = "email";
    pub const NAME: &'static str = "name";
    pub const DEFAULT_WORKSPACE_ID: &'static str = "default_workspace_id";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn external_id(&self) -> Option<&str> {
        self.get_str(Self::EXTERNAL_ID)
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str(Self::EMAIL)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(Self::NAME)
    }

    pub fn default_workspace_id(&self) -> Option<&str> {
        self.get_str(Self::DEFAULT_WORKSPACE_ID)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

impl From<BTreeMap<String, Value>> for ConnectionMetadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// A persisted connection, including its sealed token.
///
/// Not `Serialize`; callers outside the service get [`ConnectionInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub provider: ProviderId,
    pub encrypted_token: EncryptedToken,
    pub label: String,
    pub metadata: ConnectionMetadata,
    pub connected_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Strips the token.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id.clone(),
            provider: self.provider.clone(),
            label: self.label.clone(),
            metadata: self.metadata.clone(),
            connected_at: self.connected_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// Connection data safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub provider: ProviderId,
    pub label: String,
    pub metadata: ConnectionMetadata,
    pub connected_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// The fields written by an upsert.
///
/// The store keeps the existing id when a row for `(user_id, provider)`
/// already exists and assigns a new one otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnection {
    pub user_id: UserId,
    pub provider: ProviderId,
    pub encrypted_token: EncryptedToken,
    pub label: String,
    pub metadata: ConnectionMetadata,
    pub connected_at: DateTime<Utc>,
}
