//! Connection lifecycle and decrypt-then-delegate calls to providers.

use std::sync::Arc;

use chrono::Utc;

use crate::aggregate::{AggregationSettings, aggregate, effective_rounding};
use crate::cipher::Cipher;
use crate::connection::{ConnectionInfo, NewConnection};
use crate::error::{Error, Result};
use crate::provider::TokenValidation;
use crate::registry::{ProviderEntry, ProviderRegistry, ProviderSummary};
use crate::store::ConnectionStore;
use crate::types::{
    Client, ConnectionId, Project, TimeEntriesQuery, TimeEntriesResult, UserId, Workspace,
};

/// Entry point for everything a request handler does with integrations.
///
/// Holds no per-request state; one instance serves concurrent requests.
/// Plaintext tokens live only for the duration of a single call.
pub struct ConnectionService<S> {
    registry: Arc<ProviderRegistry>,
    store: S,
    cipher: Arc<Cipher>,
}

impl<S: ConnectionStore> ConnectionService<S> {
    pub const fn new(registry: Arc<ProviderRegistry>, store: S, cipher: Arc<Cipher>) -> Self {
        Self {
            registry,
            store,
            cipher,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Available integrations in registration order.
    pub fn providers(&self) -> Vec<ProviderSummary> {
        self.registry.all().iter().map(ProviderEntry::summary).collect()
    }

    /// Validates `token` with the provider and stores it encrypted.
    ///
    /// Reconnecting replaces the previous token for the same provider.
    pub async fn connect(
        &self,
        user_id: &UserId,
        provider_id: &str,
        token: &str,
    ) -> Result<ConnectionInfo> {
        let entry = self.registry.get(provider_id)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidToken);
        }

        let profile = match entry.provider().validate_token(token).await? {
            TokenValidation::Valid(profile) => profile,
            TokenValidation::Invalid => {
                tracing::warn!(user_id = %user_id, provider = %entry.id(), "provider rejected token");
                return Err(Error::InvalidToken);
            }
        };

        let encrypted_token = self.cipher.encrypt(token)?;
        let label = profile
            .name
            .clone()
            .or_else(|| profile.email.clone())
            .unwrap_or_else(|| entry.provider().name().to_string());
        let connection = self
            .store
            .upsert(NewConnection {
                user_id: user_id.clone(),
                provider: entry.id().clone(),
                encrypted_token,
                label,
                metadata: profile.into_metadata(),
                connected_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            provider = %entry.id(),
            connection_id = %connection.id,
            "connected provider"
        );
        Ok(connection.info())
    }

    /// Removes one of the user's connections.
    pub async fn disconnect(&self, user_id: &UserId, connection_id: &ConnectionId) -> Result<()> {
        if !self.store.delete(user_id, connection_id).await? {
            return Err(Error::ConnectionNotFound {
                connection_id: connection_id.clone(),
            });
        }
        tracing::info!(user_id = %user_id, connection_id = %connection_id, "disconnected provider");
        Ok(())
    }

    pub async fn list_connections(&self, user_id: &UserId) -> Result<Vec<ConnectionInfo>> {
        let connections = self.store.list(user_id).await?;
        Ok(connections.iter().map(|connection| connection.info()).collect())
    }

    pub async fn get_workspaces(&self, user_id: &UserId, provider_id: &str) -> Result<Vec<Workspace>> {
        let entry = self.registry.get(provider_id)?;
        let token = self.open_token(user_id, entry).await?;
        Ok(entry.provider().get_workspaces(&token).await?)
    }

    pub async fn get_projects(
        &self,
        user_id: &UserId,
        provider_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Project>> {
        let entry = self.registry.get(provider_id)?;
        let token = self.open_token(user_id, entry).await?;
        Ok(entry.provider().get_projects(&token, workspace_id).await?)
    }

    pub async fn get_clients(
        &self,
        user_id: &UserId,
        provider_id: &str,
        workspace_id: &str,
    ) -> Result<Vec<Client>> {
        let entry = self.registry.get(provider_id)?;
        let token = self.open_token(user_id, entry).await?;
        Ok(entry.provider().get_clients(&token, workspace_id).await?)
    }

    /// Fetches entries for `query` and aggregates them.
    ///
    /// Queries outside the provider's capabilities are rejected before the
    /// token is touched.
    pub async fn get_time_entries(
        &self,
        user_id: &UserId,
        provider_id: &str,
        query: &TimeEntriesQuery,
    ) -> Result<TimeEntriesResult> {
        let entry = self.registry.get(provider_id)?;
        query.validate().map_err(Error::InvalidQuery)?;
        let capabilities = entry.provider().capabilities();
        if let Err(reason) = capabilities.check(query) {
            tracing::warn!(provider = %entry.id(), %reason, "rejected unsupported query");
            return Err(Error::Unsupported {
                provider: entry.id().clone(),
                reason,
            });
        }

        let token = self.open_token(user_id, entry).await?;
        let raw = entry.provider().get_time_entries(&token, query).await?;
        let settings = AggregationSettings {
            rounding: effective_rounding(query, raw.workspace_rounding),
            rates_supported: capabilities.supports_billable_rates,
        };
        tracing::debug!(
            provider = %entry.id(),
            entries = raw.entries.len(),
            rounding_minutes = settings.rounding.minutes,
            "aggregating time entries"
        );
        Ok(aggregate(&raw.entries, query, settings))
    }

    /// Looks up and decrypts the user's token, recording the use.
    async fn open_token(&self, user_id: &UserId, entry: &ProviderEntry) -> Result<String> {
        let connection = self
            .store
            .find(user_id, entry.id())
            .await?
            .ok_or_else(|| Error::NotConnected {
                user_id: user_id.clone(),
                provider: entry.id().clone(),
            })?;
        let token = self.cipher.decrypt(&connection.encrypted_token)?;
        self.store.touch(&connection.id, Utc::now()).await?;
        tracing::debug!(
            user_id = %user_id,
            provider = %entry.id(),
            connection_id = %connection.id,
            "opened stored token"
        );
        Ok(token)
    }
}
