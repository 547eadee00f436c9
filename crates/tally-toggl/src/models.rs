//! Toggl Track v9 payloads and their normalization.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;
use tally_core::{
    Client, NamedRef, Project, ProviderProfile, RawTimeEntry, Rounding, RoundingDirection,
    Workspace,
};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Me {
    pub id: u64,
    pub email: Option<String>,
    pub fullname: Option<String>,
    pub default_workspace_id: Option<u64>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiWorkspace {
    pub id: u64,
    pub name: String,
    pub default_currency: Option<String>,
    pub default_hourly_rate: Option<f64>,
    /// -1 down, 0 nearest, 1 up.
    #[serde(default)]
    pub rounding: i8,
    #[serde(default)]
    pub rounding_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiProject {
    pub id: u64,
    pub name: String,
    pub client_id: Option<u64>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub billable: Option<bool>,
    pub color: Option<String>,
    pub currency: Option<String>,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiClient {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiTimeEntry {
    pub id: u64,
    pub workspace_id: u64,
    pub project_id: Option<u64>,
    pub description: Option<String>,
    /// Seconds; negative while the timer is running.
    pub duration: i64,
    pub stop: Option<String>,
    #[serde(default)]
    pub billable: bool,
}

const fn default_true() -> bool {
    true
}

impl ApiTimeEntry {
    pub(crate) fn is_running(&self) -> bool {
        self.duration < 0 || self.stop.is_none()
    }
}

impl From<Me> for ProviderProfile {
    fn from(me: Me) -> Self {
        let mut extra = BTreeMap::new();
        if let Some(timezone) = me.timezone {
            extra.insert("timezone".to_string(), Value::String(timezone));
        }
        Self {
            external_id: me.id.to_string(),
            email: me.email.filter(|email| !email.is_empty()),
            name: me.fullname.filter(|name| !name.trim().is_empty()),
            default_workspace_id: me.default_workspace_id.map(|id| id.to_string()),
            extra,
        }
    }
}

/// Converts a Toggl hourly rate to minor units.
#[expect(
    clippy::cast_possible_truncation,
    reason = "hourly rates are far below i64::MAX cents"
)]
pub(crate) fn rate_to_cents(rate: Option<f64>) -> Option<i64> {
    rate.filter(|rate| rate.is_finite() && *rate > 0.0)
        .map(|rate| (rate * 100.0).round() as i64)
}

pub(crate) fn rounding_from_api(direction: i8, minutes: u32) -> Rounding {
    if minutes == 0 {
        return Rounding::NONE;
    }
    let direction = match direction {
        i8::MIN..=-1 => RoundingDirection::Down,
        0 => RoundingDirection::Nearest,
        1..=i8::MAX => RoundingDirection::Up,
    };
    Rounding::new(direction, minutes)
}

impl From<ApiWorkspace> for Workspace {
    fn from(workspace: ApiWorkspace) -> Self {
        Self {
            id: workspace.id.to_string(),
            name: workspace.name,
            default_currency: workspace.default_currency,
            default_rate_cents: rate_to_cents(workspace.default_hourly_rate),
            rounding: rounding_from_api(workspace.rounding, workspace.rounding_minutes),
        }
    }
}

impl From<ApiClient> for Client {
    fn from(client: ApiClient) -> Self {
        Self {
            id: client.id.to_string(),
            name: client.name,
        }
    }
}

/// Joins projects with their client names.
pub(crate) fn normalize_projects(projects: Vec<ApiProject>, clients: &[Client]) -> Vec<Project> {
    let client_names: HashMap<&str, &str> = clients
        .iter()
        .map(|client| (client.id.as_str(), client.name.as_str()))
        .collect();
    projects
        .into_iter()
        .map(|project| {
            let client_id = project.client_id.map(|id| id.to_string());
            let client_name = client_id
                .as_deref()
                .and_then(|id| client_names.get(id))
                .map(|name| (*name).to_string());
            Project {
                id: project.id.to_string(),
                name: project.name,
                client_id,
                client_name,
                active: project.active,
                billable: project.billable.unwrap_or(false),
                color: project.color,
                currency: project.currency,
                rate_cents: rate_to_cents(project.rate),
            }
        })
        .collect()
}

/// Rate and currency of an entry, taken together from one source.
///
/// A project rate is priced in the project currency, else the workspace
/// currency. Without a project rate both values come from the workspace
/// defaults.
fn pricing(project: Option<&Project>, workspace: &Workspace) -> (Option<i64>, Option<String>) {
    match project.and_then(|project| project.rate_cents.map(|rate| (project, rate))) {
        Some((project, rate)) => (
            Some(rate),
            project
                .currency
                .clone()
                .or_else(|| workspace.default_currency.clone()),
        ),
        None => (
            workspace.default_rate_cents,
            workspace.default_currency.clone(),
        ),
    }
}

/// Turns finished entries of `workspace` into [`RawTimeEntry`] values.
///
/// Rate and currency are resolved as one pair. Entries pointing at an
/// unknown project keep its id with an empty name so they still match a
/// project filter.
pub(crate) fn normalize_entries(
    entries: Vec<ApiTimeEntry>,
    workspace: &Workspace,
    projects: &[Project],
) -> Vec<RawTimeEntry> {
    let projects: HashMap<&str, &Project> = projects
        .iter()
        .map(|project| (project.id.as_str(), project))
        .collect();
    entries
        .into_iter()
        .filter(|entry| entry.workspace_id.to_string() == workspace.id && !entry.is_running())
        .map(|entry| {
            let project_id = entry.project_id.map(|id| id.to_string());
            let known = project_id.as_deref().and_then(|id| projects.get(id).copied());
            let project = match (&project_id, known) {
                (_, Some(project)) => Some(NamedRef::new(&project.id, &project.name)),
                (Some(id), None) => Some(NamedRef::new(id, "")),
                (None, None) => None,
            };
            let client = known.and_then(|project| {
                project
                    .client_id
                    .as_ref()
                    .map(|id| NamedRef::new(id, project.client_name.clone().unwrap_or_default()))
            });
            let (rate_cents, currency) = pricing(known, workspace);
            RawTimeEntry {
                id: entry.id.to_string(),
                project,
                client,
                task: None,
                description: entry.description,
                duration_seconds: entry.duration,
                billable: Some(entry.billable),
                rate_cents,
                currency,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workspace() -> Workspace {
        Workspace {
            id: "100".to_string(),
            name: "Studio".to_string(),
            default_currency: Some("EUR".to_string()),
            default_rate_cents: Some(9_000),
            rounding: Rounding::NONE,
        }
    }

    fn projects() -> Vec<Project> {
        let raw: Vec<ApiProject> = serde_json::from_value(json!([
            {"id": 1, "name": "Website", "client_id": 7, "active": true, "billable": true,
             "color": "#06aaf5", "currency": "USD", "rate": 120.5},
            {"id": 2, "name": "Internal", "client_id": null, "active": false, "billable": null,
             "color": null, "currency": null, "rate": null}
        ]))
        .unwrap();
        let clients = vec![Client {
            id: "7".to_string(),
            name: "Acme".to_string(),
        }];
        normalize_projects(raw, &clients)
    }

    #[test]
    fn rounding_codes_map_to_directions() {
        assert_eq!(rounding_from_api(-1, 15), Rounding::new(RoundingDirection::Down, 15));
        assert_eq!(rounding_from_api(0, 6), Rounding::new(RoundingDirection::Nearest, 6));
        assert_eq!(rounding_from_api(1, 30), Rounding::new(RoundingDirection::Up, 30));
        assert_eq!(rounding_from_api(1, 0), Rounding::NONE);
    }

    #[test]
    fn rates_convert_to_cents() {
        assert_eq!(rate_to_cents(Some(120.5)), Some(12_050));
        assert_eq!(rate_to_cents(Some(0.0)), None);
        assert_eq!(rate_to_cents(None), None);
    }

    #[test]
    fn workspace_payload_normalizes() {
        let raw: ApiWorkspace = serde_json::from_value(json!({
            "id": 100, "name": "Studio", "default_currency": "EUR",
            "default_hourly_rate": 90, "rounding": -1, "rounding_minutes": 15,
            "organization_id": 5
        }))
        .unwrap();
        let workspace = Workspace::from(raw);
        assert_eq!(workspace.id, "100");
        assert_eq!(workspace.default_rate_cents, Some(9_000));
        assert_eq!(workspace.rounding, Rounding::new(RoundingDirection::Down, 15));
    }

    #[test]
    fn projects_carry_client_names() {
        let projects = projects();
        assert_eq!(projects[0].client_name.as_deref(), Some("Acme"));
        assert_eq!(projects[0].rate_cents, Some(12_050));
        assert!(projects[0].billable);
        assert_eq!(projects[1].client_name, None);
        assert!(!projects[1].active);
        assert!(!projects[1].billable);
    }

    #[test]
    fn profile_drops_blank_fields() {
        let me: Me = serde_json::from_value(json!({
            "id": 42, "email": "ada@example.com", "fullname": " ",
            "default_workspace_id": 100, "timezone": "Europe/Amsterdam"
        }))
        .unwrap();
        let profile = ProviderProfile::from(me);
        assert_eq!(profile.external_id, "42");
        assert_eq!(profile.name, None);
        assert_eq!(profile.default_workspace_id.as_deref(), Some("100"));
        assert_eq!(
            profile.extra.get("timezone"),
            Some(&Value::String("Europe/Amsterdam".to_string()))
        );
    }

    #[test]
    fn entries_are_filtered_and_priced() {
        let raw: Vec<ApiTimeEntry> = serde_json::from_value(json!([
            {"id": 1, "workspace_id": 100, "project_id": 1, "description": "Design",
             "duration": 3600, "stop": "2025-04-07T10:00:00Z", "billable": true},
            {"id": 2, "workspace_id": 100, "project_id": 2, "description": null,
             "duration": 1800, "stop": "2025-04-07T11:00:00Z", "billable": false},
            {"id": 3, "workspace_id": 100, "project_id": null, "description": "Running",
             "duration": -1744016400, "stop": null, "billable": false},
            {"id": 4, "workspace_id": 200, "project_id": 1, "description": "Elsewhere",
             "duration": 600, "stop": "2025-04-07T12:00:00Z", "billable": true},
            {"id": 5, "workspace_id": 100, "project_id": 99, "description": "Archived",
             "duration": 900, "stop": "2025-04-07T13:00:00Z", "billable": true}
        ]))
        .unwrap();

        let entries = normalize_entries(raw, &workspace(), &projects());
        let ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "5"]);

        assert_eq!(entries[0].client, Some(NamedRef::new("7", "Acme")));
        assert_eq!(entries[0].rate_cents, Some(12_050));
        assert_eq!(entries[0].currency.as_deref(), Some("USD"));

        assert_eq!(entries[1].client, None);
        assert_eq!(entries[1].rate_cents, Some(9_000));
        assert_eq!(entries[1].currency.as_deref(), Some("EUR"));
        assert_eq!(entries[1].billable, Some(false));

        assert_eq!(entries[2].project, Some(NamedRef::new("99", "")));
        assert_eq!(entries[2].label(tally_core::Dimension::Project), "No project");
    }

    #[test]
    fn project_currency_never_labels_the_workspace_rate() {
        let raw: Vec<ApiProject> = serde_json::from_value(json!([
            {"id": 3, "name": "Retainer", "client_id": null, "active": true, "billable": true,
             "color": null, "currency": "USD", "rate": null},
            {"id": 4, "name": "Audit", "client_id": null, "active": true, "billable": true,
             "color": null, "currency": null, "rate": 80}
        ]))
        .unwrap();
        let projects = normalize_projects(raw, &[]);
        let entries: Vec<ApiTimeEntry> = serde_json::from_value(json!([
            {"id": 1, "workspace_id": 100, "project_id": 3, "description": "Support",
             "duration": 3600, "stop": "2025-04-07T10:00:00Z", "billable": true},
            {"id": 2, "workspace_id": 100, "project_id": 4, "description": "Review",
             "duration": 3600, "stop": "2025-04-07T11:00:00Z", "billable": true}
        ]))
        .unwrap();

        let entries = normalize_entries(entries, &workspace(), &projects);
        assert_eq!(entries[0].rate_cents, Some(9_000));
        assert_eq!(entries[0].currency.as_deref(), Some("EUR"));
        assert_eq!(entries[1].rate_cents, Some(8_000));
        assert_eq!(entries[1].currency.as_deref(), Some("EUR"));
    }
}
