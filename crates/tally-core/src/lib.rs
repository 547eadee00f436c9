//! Core of the tally time-tracking integrations.
//!
//! This crate contains:
//! - Cipher: AES-256-GCM sealing of provider API tokens at rest
//! - Providers: the adapter contract, capabilities and the registry
//! - Connections: per-user records and the [`ConnectionStore`] boundary
//! - Aggregation: grouping, rounding and totalling of time entries
//! - Service: [`ConnectionService`], which ties the pieces together

mod aggregate;
pub mod cipher;
mod connection;
mod error;
pub mod provider;
mod registry;
mod service;
pub mod store;
mod types;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregationSettings, aggregate, effective_rounding};
pub use cipher::{Cipher, CipherError, EncryptedToken};
pub use connection::{Connection, ConnectionInfo, ConnectionMetadata, NewConnection};
pub use error::{Error, Result};
pub use provider::{
    BoxError, Capabilities, Provider, ProviderError, ProviderProfile, TokenValidation,
    UnsupportedQuery,
};
pub use registry::{ProviderEntry, ProviderRegistry, ProviderSummary, RegistryError};
pub use service::ConnectionService;
pub use store::{ConnectionStore, InMemoryConnectionStore, StoreError};
pub use types::{
    Client, ConnectionId, Dimension, NamedRef, Project, ProviderId, RawTimeEntries, RawTimeEntry,
    Rounding, RoundingDirection, TimeEntriesQuery, TimeEntriesResult, TimeEntryGroup,
    TimeEntryItem, UserId, ValidationError, Workspace,
};
