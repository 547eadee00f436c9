//! `tally connect`, `tally disconnect` and `tally connections`.

use std::io::Write;

use anyhow::Result;
use chrono::SecondsFormat;
use tally_core::{ConnectionId, ConnectionInfo, ConnectionService, ConnectionStore, UserId};

use super::util::{truncate, write_json};

pub async fn connect<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    provider: &str,
    token: &str,
) -> Result<()> {
    let info = service.connect(user_id, provider, token).await?;
    writeln!(writer, "Connected {} as {}", info.provider, info.label)?;
    writeln!(writer, "Connection: {}", info.id)?;
    Ok(())
}

pub async fn disconnect<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    connection_id: &str,
) -> Result<()> {
    let connection_id = ConnectionId::new(connection_id)?;
    service.disconnect(user_id, &connection_id).await?;
    writeln!(writer, "Disconnected {connection_id}")?;
    Ok(())
}

/// Format connections for human-readable output.
pub fn format_connections(connections: &[ConnectionInfo]) -> String {
    if connections.is_empty() {
        return "No connections.\n\nHint: Run 'tally connect <provider> --token <token>' to add one.\n"
            .to_string();
    }

    let mut lines = vec![format!(
        "{:<36}  {:<10}  {:<24}  Last used",
        "ID", "Provider", "Label"
    )];
    for connection in connections {
        let last_used = connection.last_used_at.map_or_else(
            || "never".to_string(),
            |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        lines.push(format!(
            "{:<36}  {:<10}  {:<24}  {last_used}",
            connection.id.as_str(),
            connection.provider.as_str(),
            truncate(&connection.label, 24),
        ));
    }
    lines.join("\n") + "\n"
}

pub async fn list<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    json: bool,
) -> Result<()> {
    let connections = service.list_connections(user_id).await?;
    if json {
        return write_json(writer, &connections);
    }
    write!(writer, "{}", format_connections(&connections))?;
    Ok(())
}
