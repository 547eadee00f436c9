//! `tally providers`: registered integrations and their capabilities.

use std::io::Write;

use anyhow::Result;
use tally_core::{ConnectionStore, ConnectionService, Dimension, ProviderSummary};

use super::util::write_json;

pub fn format_providers(providers: &[ProviderSummary]) -> String {
    let mut lines = Vec::new();
    for provider in providers {
        let caps = &provider.capabilities;
        lines.push(format!("{}  {}", provider.id, provider.name));
        lines.push(format!("  groupings: {}", join(&caps.groupings)));

        let minutes: Vec<String> = caps.rounding_minutes.iter().map(u32::to_string).collect();
        let directions: Vec<&str> = caps
            .rounding_directions
            .iter()
            .map(|direction| direction.as_str())
            .collect();
        lines.push(format!(
            "  rounding:  {} minutes ({})",
            minutes.join(", "),
            directions.join(", ")
        ));

        let supports: Vec<&str> = [
            (caps.supports_projects, "projects"),
            (caps.supports_clients, "clients"),
            (caps.supports_tasks, "tasks"),
            (caps.supports_billable_rates, "billable rates"),
            (caps.supports_currency, "currency"),
        ]
        .into_iter()
        .filter_map(|(supported, name)| supported.then_some(name))
        .collect();
        lines.push(format!("  supports:  {}", supports.join(", ")));
    }
    if lines.is_empty() {
        return "No providers registered.\n".to_string();
    }
    lines.join("\n") + "\n"
}

fn join(dimensions: &[Dimension]) -> String {
    dimensions
        .iter()
        .map(Dimension::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    json: bool,
) -> Result<()> {
    let providers = service.providers();
    if json {
        return write_json(writer, &providers);
    }
    write!(writer, "{}", format_providers(&providers))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::stub_service;
    use insta::assert_snapshot;

    #[test]
    fn lists_capabilities_per_provider() {
        let service = stub_service();
        let mut output = Vec::new();
        run(&mut output, &service, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        stub  Stub Tracker
          groupings: project, description
          rounding:  0, 15 minutes (nearest, up)
          supports:  projects, billable rates, currency
        ");
    }

    #[test]
    fn json_output_includes_capabilities() {
        let service = stub_service();
        let mut output = Vec::new();
        run(&mut output, &service, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value[0]["id"], "stub");
        assert_eq!(value[0]["capabilities"]["supports_tasks"], false);
    }
}
