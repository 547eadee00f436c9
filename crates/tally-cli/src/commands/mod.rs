//! CLI subcommand implementations.

pub mod catalog;
pub mod connections;
pub mod entries;
pub mod providers;
pub mod util;

#[cfg(test)]
mod test_support;
