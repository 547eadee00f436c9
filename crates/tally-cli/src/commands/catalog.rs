//! `tally workspaces`, `tally projects` and `tally clients`.

use std::io::Write;

use anyhow::Result;
use tally_core::{Client, ConnectionService, ConnectionStore, Project, UserId, Workspace};

use super::util::{format_amount, truncate, write_json};

pub fn format_workspaces(workspaces: &[Workspace]) -> String {
    if workspaces.is_empty() {
        return "No workspaces.\n".to_string();
    }
    let mut lines = Vec::new();
    for workspace in workspaces {
        let rounding = if workspace.rounding.minutes == 0 {
            "no rounding".to_string()
        } else {
            format!(
                "rounds {} to {}m",
                workspace.rounding.direction, workspace.rounding.minutes
            )
        };
        lines.push(format!(
            "{:<12}  {:<24}  {:<12}  {rounding}",
            workspace.id,
            truncate(&workspace.name, 24),
            format_amount(
                workspace.default_rate_cents,
                workspace.default_currency.as_deref()
            ),
        ));
    }
    lines.join("\n") + "\n"
}

pub fn format_projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects.\n".to_string();
    }
    let mut lines = Vec::new();
    for project in projects {
        let mut flags = Vec::new();
        if project.billable {
            flags.push("billable");
        }
        if !project.active {
            flags.push("archived");
        }
        lines.push(format!(
            "{:<12}  {:<24}  {:<16}  {:<12}  {}",
            project.id,
            truncate(&project.name, 24),
            truncate(project.client_name.as_deref().unwrap_or("-"), 16),
            format_amount(project.rate_cents, project.currency.as_deref()),
            flags.join(", "),
        ));
    }
    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

pub fn format_clients(clients: &[Client]) -> String {
    if clients.is_empty() {
        return "No clients.\n".to_string();
    }
    clients
        .iter()
        .map(|client| format!("{:<12}  {}\n", client.id, client.name))
        .collect()
}

pub async fn workspaces<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    provider: &str,
    json: bool,
) -> Result<()> {
    let workspaces = service.get_workspaces(user_id, provider).await?;
    if json {
        return write_json(writer, &workspaces);
    }
    write!(writer, "{}", format_workspaces(&workspaces))?;
    Ok(())
}

pub async fn projects<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    provider: &str,
    workspace_id: &str,
    json: bool,
) -> Result<()> {
    let projects = service.get_projects(user_id, provider, workspace_id).await?;
    if json {
        return write_json(writer, &projects);
    }
    write!(writer, "{}", format_projects(&projects))?;
    Ok(())
}

pub async fn clients<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    provider: &str,
    workspace_id: &str,
    json: bool,
) -> Result<()> {
    let clients = service.get_clients(user_id, provider, workspace_id).await?;
    if json {
        return write_json(writer, &clients);
    }
    write!(writer, "{}", format_clients(&clients))?;
    Ok(())
}
