//! Lookup from provider id to implementation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::provider::{Capabilities, Provider};
use crate::types::{ProviderId, ValidationError};

/// Registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No provider with this id was registered at startup.
    #[error("provider not registered: {0}")]
    NotRegistered(String),
    /// Two providers share an id.
    #[error("provider already registered: {0}")]
    Duplicate(ProviderId),
    /// The provider reports an unusable id.
    #[error("invalid provider id: {0}")]
    InvalidId(#[from] ValidationError),
}

/// A registered provider and its validated id.
#[derive(Clone)]
pub struct ProviderEntry {
    id: ProviderId,
    provider: Arc<dyn Provider>,
}

impl ProviderEntry {
    pub const fn id(&self) -> &ProviderId {
        &self.id
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            id: self.id.clone(),
            name: self.provider.name().to_string(),
            capabilities: self.provider.capabilities().clone(),
        }
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("name", &self.provider.name())
            .finish_non_exhaustive()
    }
}

/// What callers are shown about an available integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub id: ProviderId,
    pub name: String,
    pub capabilities: Capabilities,
}

/// Providers available to this process.
///
/// Built once at startup with [`register`](Self::register), then shared
/// read-only (typically behind an `Arc`), so lookups take no lock.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider under its own [`Provider::id`].
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<(), RegistryError> {
        let id = ProviderId::new(provider.id())?;
        if self.index.contains_key(id.as_str()) {
            return Err(RegistryError::Duplicate(id));
        }
        tracing::debug!(provider = %id, "registered provider");
        self.index.insert(id.as_str().to_string(), self.entries.len());
        self.entries.push(ProviderEntry { id, provider });
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Result<Self, RegistryError> {
        self.register(provider)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Result<&ProviderEntry, RegistryError> {
        self.index
            .get(id)
            .map(|&position| &self.entries[position])
            .ok_or_else(|| RegistryError::NotRegistered(id.to_string()))
    }

    /// Returns the implementation registered under `id`.
    pub fn get_provider(&self, id: &str) -> Result<Arc<dyn Provider>, RegistryError> {
        self.get(id).map(|entry| Arc::clone(&entry.provider))
    }

    /// All providers in registration order.
    pub fn all(&self) -> &[ProviderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
