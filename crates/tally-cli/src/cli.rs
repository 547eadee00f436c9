//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tally_core::{Dimension, RoundingDirection};

/// Time-tracking integrations.
///
/// Connects time-tracking accounts with encrypted tokens and reports their
/// entries grouped, rounded and totalled.
#[derive(Debug, Parser)]
#[command(name = "tally", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this user instead of the configured one.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available providers and what they support.
    Providers {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate an API token and store it encrypted.
    Connect {
        /// Provider id (e.g., toggl).
        provider: String,

        /// API token issued by the provider.
        #[arg(long, env = "TALLY_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Remove a stored connection.
    Disconnect {
        /// Connection id as shown by `tally connections`.
        connection_id: String,
    },

    /// List stored connections.
    Connections {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List workspaces of a connected provider.
    Workspaces {
        provider: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List projects in a workspace.
    Projects {
        provider: String,
        workspace: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List clients in a workspace.
    Clients {
        provider: String,
        workspace: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report time entries grouped and totalled.
    Entries(EntriesArgs),
}

/// Arguments for `tally entries`.
#[derive(Debug, Args)]
pub struct EntriesArgs {
    pub provider: String,
    pub workspace: String,

    /// First day of the range (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,

    /// Last day of the range, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub end: NaiveDate,

    /// Only include entries of this project.
    #[arg(long)]
    pub project: Option<String>,

    /// Top-level grouping.
    #[arg(long, default_value = "project")]
    pub group_by: Dimension,

    /// Grouping inside each group.
    #[arg(long, default_value = "description")]
    pub sub_group_by: Dimension,

    /// Round each entry to this many minutes (0 disables rounding).
    #[arg(long)]
    pub round: Option<u32>,

    /// Rounding direction used with --round.
    #[arg(long, default_value = "nearest")]
    pub round_direction: RoundingDirection,

    /// Only include billable entries.
    #[arg(long)]
    pub billable_only: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
