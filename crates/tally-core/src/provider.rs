//! The contract every time-tracking integration implements.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::connection::ConnectionMetadata;
use crate::types::{
    Client, Dimension, Project, RawTimeEntries, RoundingDirection, TimeEntriesQuery, Workspace,
};

/// Boxed error used for transport failures of arbitrary HTTP clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised by a provider adapter.
///
/// The service never rewraps these; they reach the caller as-is.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the credentials on a data call.
    #[error("{provider} rejected the credentials (status {status})")]
    Unauthorized { provider: &'static str, status: u16 },
    /// The provider answered with a non-success status.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    /// The request never produced a response.
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: BoxError,
    },
    /// The response body did not have the expected shape.
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

/// Why a query falls outside a provider's capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedQuery {
    Grouping(Dimension),
    Combination {
        grouping: Dimension,
        sub_grouping: Dimension,
    },
    RoundingMinutes(u32),
    RoundingDirection(RoundingDirection),
}

impl fmt::Display for UnsupportedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grouping(dimension) => write!(f, "grouping by {dimension}"),
            Self::Combination {
                grouping,
                sub_grouping,
            } => write!(f, "grouping by {grouping} then {sub_grouping}"),
            Self::RoundingMinutes(minutes) => write!(f, "rounding to {minutes} minutes"),
            Self::RoundingDirection(direction) => write!(f, "rounding {direction}"),
        }
    }
}

/// What a provider can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Dimensions allowed as the top-level grouping.
    pub groupings: Vec<Dimension>,
    /// Allowed `(grouping, sub_grouping)` pairs.
    pub combinations: Vec<(Dimension, Dimension)>,
    /// Allowed rounding granularities in minutes. `0` means no rounding.
    pub rounding_minutes: Vec<u32>,
    pub rounding_directions: Vec<RoundingDirection>,
    pub supports_clients: bool,
    pub supports_tasks: bool,
    pub supports_billable_rates: bool,
    pub supports_currency: bool,
    pub supports_projects: bool,
}

impl Capabilities {
    /// Every ordered pair of distinct dimensions from `dimensions`.
    pub fn distinct_pairs(dimensions: &[Dimension]) -> Vec<(Dimension, Dimension)> {
        dimensions
            .iter()
            .flat_map(|&grouping| {
                dimensions
                    .iter()
                    .filter(move |&&sub| sub != grouping)
                    .map(move |&sub| (grouping, sub))
            })
            .collect()
    }

    /// Checks grouping, subgrouping and any rounding override against the matrix.
    pub fn check(&self, query: &TimeEntriesQuery) -> Result<(), UnsupportedQuery> {
        if !self.groupings.contains(&query.grouping) {
            return Err(UnsupportedQuery::Grouping(query.grouping));
        }
        if !self
            .combinations
            .contains(&(query.grouping, query.sub_grouping))
        {
            return Err(UnsupportedQuery::Combination {
                grouping: query.grouping,
                sub_grouping: query.sub_grouping,
            });
        }
        if let Some(rounding) = query.rounding {
            if !self.rounding_minutes.contains(&rounding.minutes) {
                return Err(UnsupportedQuery::RoundingMinutes(rounding.minutes));
            }
            if !self.rounding_directions.contains(&rounding.direction) {
                return Err(UnsupportedQuery::RoundingDirection(rounding.direction));
            }
        }
        Ok(())
    }
}

/// The account behind a validated token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProfile {
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub default_workspace_id: Option<String>,
    /// Provider-specific extras, stored next to the guaranteed keys.
    pub extra: BTreeMap<String, Value>,
}

impl ProviderProfile {
    pub fn into_metadata(self) -> ConnectionMetadata {
        let mut metadata = ConnectionMetadata::from(self.extra);
        metadata.insert(ConnectionMetadata::EXTERNAL_ID, self.external_id);
        if let Some(email) = self.email {
            metadata.insert(ConnectionMetadata::EMAIL, email);
        }
        if let Some(name) = self.name {
            metadata.insert(ConnectionMetadata::NAME, name);
        }
        if let Some(workspace_id) = self.default_workspace_id {
            metadata.insert(ConnectionMetadata::DEFAULT_WORKSPACE_ID, workspace_id);
        }
        metadata
    }
}

/// Outcome of a token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(ProviderProfile),
    Invalid,
}

/// A time-tracking integration.
///
/// Implementations are registered once at startup in a
/// [`ProviderRegistry`](crate::ProviderRegistry) and shared across requests,
/// so they must be `Send + Sync`. Every data call receives the decrypted
/// token; implementations must not retain it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used as the registry key and stored on connections.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &Capabilities;

    /// Performs a live check of `token`.
    ///
    /// Returns [`TokenValidation::Invalid`] when the provider rejects the
    /// token and `Err` for anything else that goes wrong.
    async fn validate_token(&self, token: &str) -> Result<TokenValidation, ProviderError>;

    async fn get_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ProviderError>;

    async fn get_projects(
        &self,
        token: &str,
        workspace_id: &str,
    ) -> Result<Vec<Project>, ProviderError>;

    async fn get_clients(&self, token: &str, workspace_id: &str)
    -> Result<Vec<Client>, ProviderError>;

    /// Fetches the normalized entries in the query's workspace and date range.
    async fn get_time_entries(
        &self,
        token: &str,
        query: &TimeEntriesQuery,
    ) -> Result<RawTimeEntries, ProviderError>;
}
