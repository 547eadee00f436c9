//! Stub provider and service for command tests.

use std::sync::Arc;

use async_trait::async_trait;
use tally_core::{
    Capabilities, Cipher, Client, ConnectionService, Dimension, InMemoryConnectionStore, NamedRef,
    Project, Provider, ProviderError, ProviderProfile, ProviderRegistry, RawTimeEntries,
    RawTimeEntry, RoundingDirection, TimeEntriesQuery, TokenValidation, UserId, Workspace,
};

pub const GOOD_TOKEN: &str = "good-token";
const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub struct StubProvider {
    capabilities: Capabilities,
}

impl StubProvider {
    fn new() -> Self {
        let groupings = vec![Dimension::Project, Dimension::Description];
        Self {
            capabilities: Capabilities {
                combinations: Capabilities::distinct_pairs(&groupings),
                groupings,
                rounding_minutes: vec![0, 15],
                rounding_directions: vec![RoundingDirection::Nearest, RoundingDirection::Up],
                supports_clients: false,
                supports_tasks: false,
                supports_billable_rates: true,
                supports_currency: true,
                supports_projects: true,
            },
        }
    }
}

fn entry(id: &str, description: &str, minutes: i64, billable: bool) -> RawTimeEntry {
    RawTimeEntry {
        id: id.to_string(),
        project: Some(NamedRef::new("p-1", "Website")),
        description: Some(description.to_string()),
        duration_seconds: minutes * 60,
        billable: Some(billable),
        rate_cents: Some(12_000),
        currency: Some("EUR".to_string()),
        ..RawTimeEntry::default()
    }
}

fn check(token: &str) -> Result<(), ProviderError> {
    if token == GOOD_TOKEN {
        Ok(())
    } else {
        Err(ProviderError::Unauthorized {
            provider: "stub",
            status: 401,
        })
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn name(&self) -> &'static str {
        "Stub Tracker"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn validate_token(&self, token: &str) -> Result<TokenValidation, ProviderError> {
        if check(token).is_err() {
            return Ok(TokenValidation::Invalid);
        }
        Ok(TokenValidation::Valid(ProviderProfile {
            external_id: "42".to_string(),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada Lovelace".to_string()),
            default_workspace_id: Some("100".to_string()),
            ..ProviderProfile::default()
        }))
    }

    async fn get_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ProviderError> {
        check(token)?;
        Ok(vec![Workspace {
            id: "100".to_string(),
            name: "Studio".to_string(),
            default_currency: Some("EUR".to_string()),
            default_rate_cents: Some(9_000),
            rounding: tally_core::Rounding::new(RoundingDirection::Up, 15),
        }])
    }

    async fn get_projects(
        &self,
        token: &str,
        _workspace_id: &str,
    ) -> Result<Vec<Project>, ProviderError> {
        check(token)?;
        Ok(vec![Project {
            id: "p-1".to_string(),
            name: "Website".to_string(),
            client_id: Some("c-1".to_string()),
            client_name: Some("Acme".to_string()),
            active: true,
            billable: true,
            color: None,
            currency: Some("EUR".to_string()),
            rate_cents: Some(12_000),
        }])
    }

    async fn get_clients(&self, token: &str, _workspace_id: &str) -> Result<Vec<Client>, ProviderError> {
        check(token)?;
        Ok(vec![Client {
            id: "c-1".to_string(),
            name: "Acme".to_string(),
        }])
    }

    async fn get_time_entries(
        &self,
        token: &str,
        _query: &TimeEntriesQuery,
    ) -> Result<RawTimeEntries, ProviderError> {
        check(token)?;
        Ok(RawTimeEntries {
            entries: vec![
                entry("1", "Design", 37, true),
                entry("2", "Design", 37, true),
                entry("3", "Build", 37, true),
                entry("4", "Meeting", 37, false),
            ],
            workspace_rounding: None,
        })
    }
}

pub fn stub_service() -> ConnectionService<InMemoryConnectionStore> {
    let registry = ProviderRegistry::new()
        .with(Arc::new(StubProvider::new()))
        .unwrap();
    ConnectionService::new(
        Arc::new(registry),
        InMemoryConnectionStore::new(),
        Arc::new(Cipher::new(Some(TEST_KEY.to_string()))),
    )
}

pub fn user() -> UserId {
    UserId::new("user-1").unwrap()
}
