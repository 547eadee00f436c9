//! Tally CLI library.
//!
//! This crate provides the CLI interface for the tally integrations.

pub mod app;
mod cli;
pub mod commands;
mod config;

pub use app::App;
pub use cli::{Cli, Commands, EntriesArgs};
pub use config::Config;
