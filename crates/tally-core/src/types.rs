//! Core type definitions with validation.
//!
//! Everything here except the identifiers is request-scoped: providers
//! normalize their payloads into these shapes and the aggregation engine
//! consumes them. None of it is persisted.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Unknown grouping dimension.
    #[error("invalid dimension: {value} (expected project, client, task or description)")]
    InvalidDimension { value: String },

    /// Unknown rounding direction.
    #[error("invalid rounding direction: {value} (expected nearest, up or down)")]
    InvalidRoundingDirection { value: String },

    /// A query without a workspace.
    #[error("workspace id cannot be empty")]
    EmptyWorkspace,

    /// A query whose range ends before it starts.
    #[error("date range ends ({end}) before it starts ({start})")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// Identifier of a registered provider, e.g. `toggl`.
    ProviderId, "provider ID"
);

define_string_id!(
    /// Identifier of the user owning a connection.
    ///
    /// Issued by the authentication layer; this crate only scopes by it.
    UserId, "user ID"
);

define_string_id!(
    /// Identifier of a stored connection.
    ConnectionId, "connection ID"
);

impl ConnectionId {
    /// Returns a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// A dimension time entries can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Project,
    Client,
    Task,
    Description,
}

impl Dimension {
    /// All dimensions in declaration order.
    pub const ALL: [Self; 4] = [Self::Project, Self::Client, Self::Task, Self::Description];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Client => "client",
            Self::Task => "task",
            Self::Description => "description",
        }
    }

    /// Label used when an entry has no value for this dimension.
    #[must_use]
    pub const fn fallback_label(&self) -> &'static str {
        match self {
            Self::Project => "No project",
            Self::Client => "No client",
            Self::Task => "No task",
            Self::Description => "No description",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "client" => Ok(Self::Client),
            "task" => Ok(Self::Task),
            "description" => Ok(Self::Description),
            _ => Err(ValidationError::InvalidDimension {
                value: s.to_string(),
            }),
        }
    }
}

/// Direction applied when a duration falls between two granularity steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingDirection {
    Nearest,
    Up,
    Down,
}

impl RoundingDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for RoundingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RoundingDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(Self::Nearest),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(ValidationError::InvalidRoundingDirection {
                value: s.to_string(),
            }),
        }
    }
}

/// Per-entry rounding policy.
///
/// A granularity of zero minutes leaves durations untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rounding {
    pub direction: RoundingDirection,
    pub minutes: u32,
}

impl Rounding {
    /// No rounding at all.
    pub const NONE: Self = Self {
        direction: RoundingDirection::Nearest,
        minutes: 0,
    };

    #[must_use]
    pub const fn new(direction: RoundingDirection, minutes: u32) -> Self {
        Self { direction, minutes }
    }

    /// Rounds a duration in seconds to the configured granularity.
    ///
    /// Negative durations (running timers) are treated as zero. Exact
    /// midpoints round up under [`RoundingDirection::Nearest`].
    #[must_use]
    pub fn apply(self, seconds: i64) -> i64 {
        let seconds = seconds.max(0);
        if self.minutes == 0 {
            return seconds;
        }
        let step = i64::from(self.minutes) * 60;
        let remainder = seconds % step;
        if remainder == 0 {
            return seconds;
        }
        let floor = seconds - remainder;
        match self.direction {
            RoundingDirection::Down => floor,
            RoundingDirection::Up => floor + step,
            RoundingDirection::Nearest => {
                if remainder * 2 >= step {
                    floor + step
                } else {
                    floor
                }
            }
        }
    }
}

impl Default for Rounding {
    fn default() -> Self {
        Self::NONE
    }
}

/// A workspace as exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub default_currency: Option<String>,
    /// Default hourly rate in minor currency units.
    pub default_rate_cents: Option<i64>,
    pub rounding: Rounding,
}

/// A project as exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub active: bool,
    pub billable: bool,
    pub color: Option<String>,
    pub currency: Option<String>,
    /// Hourly rate in minor currency units.
    pub rate_cents: Option<i64>,
}

/// A client as exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
}

/// A provider-side entity referenced by a time entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

impl NamedRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A single time entry, already normalized by its provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawTimeEntry {
    pub id: String,
    pub project: Option<NamedRef>,
    pub client: Option<NamedRef>,
    pub task: Option<NamedRef>,
    pub description: Option<String>,
    pub duration_seconds: i64,
    pub billable: Option<bool>,
    /// Hourly rate in minor currency units.
    pub rate_cents: Option<i64>,
    pub currency: Option<String>,
}

impl RawTimeEntry {
    /// Returns the label this entry is bucketed under for `dimension`.
    pub fn label(&self, dimension: Dimension) -> &str {
        let label = match dimension {
            Dimension::Project => self.project.as_ref().map(|p| p.name.as_str()),
            Dimension::Client => self.client.as_ref().map(|c| c.name.as_str()),
            Dimension::Task => self.task.as_ref().map(|t| t.name.as_str()),
            Dimension::Description => self.description.as_deref(),
        };
        match label.map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => dimension.fallback_label(),
        }
    }
}

/// Raw entries returned by a provider for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTimeEntries {
    pub entries: Vec<RawTimeEntry>,
    /// The workspace's own rounding, applied when the query has no override.
    pub workspace_rounding: Option<Rounding>,
}

/// A request for grouped time entry totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntriesQuery {
    pub workspace_id: String,
    /// First day of the range, inclusive.
    pub start: NaiveDate,
    /// Last day of the range, inclusive.
    pub end: NaiveDate,
    pub project_id: Option<String>,
    pub grouping: Dimension,
    pub sub_grouping: Dimension,
    pub rounding: Option<Rounding>,
    pub billable_only: bool,
}

impl TimeEntriesQuery {
    /// Creates a query with project/description grouping and no filters.
    pub fn new(workspace_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            start,
            end,
            project_id: None,
            grouping: Dimension::Project,
            sub_grouping: Dimension::Description,
            rounding: None,
            billable_only: false,
        }
    }

    /// Checks the parts of the query that do not depend on a provider.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workspace_id.trim().is_empty() {
            return Err(ValidationError::EmptyWorkspace);
        }
        if self.end < self.start {
            return Err(ValidationError::InvertedRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// A subgroup bucket: the leaf unit of an aggregated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntryItem {
    pub label: String,
    pub total_seconds: i64,
    pub total_amount_cents: Option<i64>,
    pub rate_cents: Option<i64>,
    pub currency: Option<String>,
    /// Number of raw entries folded into this item.
    pub entry_count: usize,
}

/// A top-level group with its subgroup items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntryGroup {
    pub id: String,
    pub title: String,
    pub items: Vec<TimeEntryItem>,
    pub total_seconds: i64,
    pub total_amount_cents: Option<i64>,
    pub currency: Option<String>,
}

/// Aggregated totals for one query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeEntriesResult {
    pub groups: Vec<TimeEntryGroup>,
    pub total_seconds: i64,
    pub total_amount_cents: Option<i64>,
    pub currency: Option<String>,
}
