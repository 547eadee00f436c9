//! Scripted provider for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::provider::{Capabilities, Provider, ProviderError, ProviderProfile, TokenValidation};
use crate::types::{
    Client, Dimension, Project, RawTimeEntries, RawTimeEntry, Rounding, RoundingDirection,
    TimeEntriesQuery, Workspace,
};

pub(crate) struct FakeProvider {
    id: &'static str,
    capabilities: Capabilities,
    valid_tokens: Vec<String>,
    entries: Vec<RawTimeEntry>,
    workspace_rounding: Option<Rounding>,
    failure_status: Option<u16>,
    calls: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn new(id: &'static str) -> Self {
        let groupings = vec![Dimension::Project, Dimension::Client, Dimension::Description];
        Self {
            id,
            capabilities: Capabilities {
                combinations: Capabilities::distinct_pairs(&groupings),
                groupings,
                rounding_minutes: vec![0, 15, 30],
                rounding_directions: vec![
                    RoundingDirection::Nearest,
                    RoundingDirection::Up,
                    RoundingDirection::Down,
                ],
                supports_clients: true,
                supports_tasks: false,
                supports_billable_rates: true,
                supports_currency: true,
                supports_projects: true,
            },
            valid_tokens: Vec::new(),
            entries: Vec::new(),
            workspace_rounding: None,
            failure_status: None,
            calls: AtomicUsize::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn accepting(mut self, token: &str) -> Self {
        self.valid_tokens.push(token.to_string());
        self
    }

    pub(crate) fn with_entries(mut self, entries: Vec<RawTimeEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub(crate) fn with_workspace_rounding(mut self, rounding: Rounding) -> Self {
        self.workspace_rounding = Some(rounding);
        self
    }

    pub(crate) fn without_rates(mut self) -> Self {
        self.capabilities.supports_billable_rates = false;
        self
    }

    /// Makes every call fail with an upstream API error.
    pub(crate) fn failing(mut self, status: u16) -> Self {
        self.failure_status = Some(status);
        self
    }

    /// Number of calls that would have hit the network.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen
            .lock()
            .map(|tokens| tokens.clone())
            .unwrap_or_default()
    }

    fn record(&self, token: &str) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut tokens) = self.tokens_seen.lock() {
            tokens.push(token.to_string());
        }
        match self.failure_status {
            Some(status) => Err(ProviderError::Api {
                provider: self.id,
                status,
                message: "upstream unavailable".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        "Fake Tracker"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn validate_token(&self, token: &str) -> Result<TokenValidation, ProviderError> {
        self.record(token)?;
        if !self.valid_tokens.iter().any(|valid| valid == token) {
            return Ok(TokenValidation::Invalid);
        }
        Ok(TokenValidation::Valid(ProviderProfile {
            external_id: "ext-42".to_string(),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada Lovelace".to_string()),
            default_workspace_id: Some("ws-1".to_string()),
            extra: std::collections::BTreeMap::new(),
        }))
    }

    async fn get_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ProviderError> {
        self.record(token)?;
        Ok(vec![Workspace {
            id: "ws-1".to_string(),
            name: "Studio".to_string(),
            default_currency: Some("EUR".to_string()),
            default_rate_cents: Some(10_000),
            rounding: self.workspace_rounding.unwrap_or_default(),
        }])
    }

    async fn get_projects(
        &self,
        token: &str,
        _workspace_id: &str,
    ) -> Result<Vec<Project>, ProviderError> {
        self.record(token)?;
        Ok(vec![Project {
            id: "p-1".to_string(),
            name: "Website".to_string(),
            client_id: Some("c-1".to_string()),
            client_name: Some("Acme".to_string()),
            active: true,
            billable: true,
            color: Some("#06aaf5".to_string()),
            currency: Some("EUR".to_string()),
            rate_cents: Some(10_000),
        }])
    }

    async fn get_clients(
        &self,
        token: &str,
        _workspace_id: &str,
    ) -> Result<Vec<Client>, ProviderError> {
        self.record(token)?;
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
        self.record(token)?;
        Ok(RawTimeEntries {
            entries: self.entries.clone(),
            workspace_rounding: self.workspace_rounding,
        })
    }
}
