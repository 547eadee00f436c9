//! Wiring of configuration, storage and providers into a service.

use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::{Cipher, ConnectionService, ProviderRegistry, UserId};
use tally_db::SqliteConnectionStore;
use tally_toggl::TogglProvider;

use crate::Config;

pub type Service = ConnectionService<SqliteConnectionStore>;

/// Everything a command needs.
pub struct App {
    pub config: Config,
    pub user_id: UserId,
    pub service: Service,
}

/// Registers every built-in provider.
pub fn build_registry(config: &Config) -> Result<ProviderRegistry> {
    let toggl =
        TogglProvider::with_base_url(&config.toggl_api_url).context("failed to build Toggl client")?;
    let registry = ProviderRegistry::new().with(Arc::new(toggl))?;
    Ok(registry)
}

impl App {
    /// Opens the database, ensuring the parent directory exists.
    pub fn open(config: Config, user: Option<&str>) -> Result<Self> {
        let user_id = UserId::new(user.unwrap_or(&config.user_id)).context("invalid user id")?;

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let store = SqliteConnectionStore::open(&config.database_path).with_context(|| {
            format!("failed to open {}", config.database_path.display())
        })?;

        let registry = build_registry(&config)?;
        let cipher = Cipher::new(config.encryption_key.clone());
        let service = ConnectionService::new(Arc::new(registry), store, Arc::new(cipher));
        Ok(Self {
            config,
            user_id,
            service,
        })
    }
}
