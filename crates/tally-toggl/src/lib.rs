//! Toggl Track integration for tally.
//!
//! Talks to the Toggl Track v9 REST API with per-call basic auth and
//! normalizes its payloads into `tally-core` types.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tally_core::{
    Capabilities, Client, Dimension, Project, Provider, ProviderError, ProviderProfile,
    RawTimeEntries, RoundingDirection, TimeEntriesQuery, TokenValidation, Workspace,
};

use crate::models::{ApiClient, ApiProject, ApiTimeEntry, ApiWorkspace, Me};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const TOGGL_API_URL: &str = "https://api.track.toggl.com/api/v9";
const PROVIDER_ID: &str = "toggl";
const ROUNDING_MINUTES: [u32; 10] = [0, 1, 5, 6, 10, 12, 15, 30, 60, 240];

/// Toggl Track provider.
///
/// Holds no credentials; the token is supplied with every call.
#[derive(Debug, Clone)]
pub struct TogglProvider {
    http: reqwest::Client,
    base_url: String,
    capabilities: Capabilities,
}

impl TogglProvider {
    /// Creates a provider against the public Toggl API.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(TOGGL_API_URL)
    }

    /// Creates a provider against another deployment of the v9 API.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(transport)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            capabilities: capabilities(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "toggl request");
        let response = self
            .http
            .get(&url)
            .basic_auth(token, Some("api_token"))
            .query(query)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized {
                provider: PROVIDER_ID,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: PROVIDER_ID,
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }
        serde_json::from_str(&body).map_err(|err| ProviderError::InvalidResponse {
            provider: PROVIDER_ID,
            message: format!("{path}: {err}"),
        })
    }

    /// Toggl answers `null` instead of `[]` for some empty collections.
    async fn get_list<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let list: Option<Vec<T>> = self.get(token, path, query).await?;
        Ok(list.unwrap_or_default())
    }

    async fn workspace(&self, token: &str, workspace_id: &str) -> Result<Workspace, ProviderError> {
        self.get_workspaces(token)
            .await?
            .into_iter()
            .find(|workspace| workspace.id == workspace_id)
            .ok_or_else(|| ProviderError::Api {
                provider: PROVIDER_ID,
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("workspace {workspace_id} not found"),
            })
    }
}

fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        provider: PROVIDER_ID,
        source: Box::new(err),
    }
}

fn capabilities() -> Capabilities {
    let groupings = vec![Dimension::Project, Dimension::Client, Dimension::Description];
    Capabilities {
        combinations: Capabilities::distinct_pairs(&groupings),
        groupings,
        rounding_minutes: ROUNDING_MINUTES.to_vec(),
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
    }
}

#[async_trait]
impl Provider for TogglProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        "Toggl Track"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn validate_token(&self, token: &str) -> Result<TokenValidation, ProviderError> {
        match self.get::<Me>(token, "/me", &[]).await {
            Ok(me) => Ok(TokenValidation::Valid(ProviderProfile::from(me))),
            Err(ProviderError::Unauthorized { status, .. }) => {
                tracing::debug!(status, "toggl rejected token");
                Ok(TokenValidation::Invalid)
            }
            Err(err) => Err(err),
        }
    }

    async fn get_workspaces(&self, token: &str) -> Result<Vec<Workspace>, ProviderError> {
        let workspaces: Vec<ApiWorkspace> = self.get_list(token, "/me/workspaces", &[]).await?;
        Ok(workspaces.into_iter().map(Workspace::from).collect())
    }

    async fn get_projects(
        &self,
        token: &str,
        workspace_id: &str,
    ) -> Result<Vec<Project>, ProviderError> {
        let clients = self.get_clients(token, workspace_id).await?;
        let projects: Vec<ApiProject> = self
            .get_list(token, &format!("/workspaces/{workspace_id}/projects"), &[])
            .await?;
        Ok(models::normalize_projects(projects, &clients))
    }

    async fn get_clients(&self, token: &str, workspace_id: &str) -> Result<Vec<Client>, ProviderError> {
        let clients: Vec<ApiClient> = self
            .get_list(token, &format!("/workspaces/{workspace_id}/clients"), &[])
            .await?;
        Ok(clients.into_iter().map(Client::from).collect())
    }

    async fn get_time_entries(
        &self,
        token: &str,
        query: &TimeEntriesQuery,
    ) -> Result<RawTimeEntries, ProviderError> {
        let workspace = self.workspace(token, &query.workspace_id).await?;
        let projects = self.get_projects(token, &query.workspace_id).await?;
        // end_date is exclusive upstream.
        let end = query.end.succ_opt().unwrap_or(query.end);
        let entries: Vec<ApiTimeEntry> = self
            .get_list(
                token,
                "/me/time_entries",
                &[
                    ("start_date", query.start.format("%Y-%m-%d").to_string()),
                    ("end_date", end.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;
        let fetched = entries.len();
        let entries = models::normalize_entries(entries, &workspace, &projects);
        tracing::debug!(
            workspace_id = %workspace.id,
            fetched,
            kept = entries.len(),
            "normalized toggl time entries"
        );
        Ok(RawTimeEntries {
            entries,
            workspace_rounding: Some(workspace.rounding),
        })
    }
}
