//! `tally entries`: grouped and totalled time entries.

use std::io::Write;

use anyhow::Result;
use tally_core::{
    ConnectionService, ConnectionStore, Rounding, TimeEntriesQuery, TimeEntriesResult, UserId,
};

use super::util::{format_amount, format_duration, truncate, write_json};
use crate::cli::EntriesArgs;

const LABEL_WIDTH: usize = 30;

pub fn query_from_args(args: &EntriesArgs) -> TimeEntriesQuery {
    TimeEntriesQuery {
        project_id: args.project.clone(),
        grouping: args.group_by,
        sub_grouping: args.sub_group_by,
        rounding: args
            .round
            .map(|minutes| Rounding::new(args.round_direction, minutes)),
        billable_only: args.billable_only,
        ..TimeEntriesQuery::new(&args.workspace, args.start, args.end)
    }
}

fn line(indent: usize, label: &str, seconds: i64, amount: &str) -> String {
    let width = LABEL_WIDTH - indent;
    format!(
        "{:indent$}{:<width$} {:>8}  {amount}",
        "",
        truncate(label, width),
        format_duration(seconds),
    )
}

/// Format an aggregated result for human-readable output.
pub fn format_result(result: &TimeEntriesResult) -> String {
    if result.groups.is_empty() {
        return "No time entries in range.\n".to_string();
    }
    let mut lines = Vec::new();
    for group in &result.groups {
        lines.push(line(
            0,
            &group.title,
            group.total_seconds,
            &format_amount(group.total_amount_cents, group.currency.as_deref()),
        ));
        for item in &group.items {
            lines.push(line(
                2,
                &item.label,
                item.total_seconds,
                &format_amount(item.total_amount_cents, item.currency.as_deref()),
            ));
        }
        lines.push(String::new());
    }
    lines.push(line(
        0,
        "Total",
        result.total_seconds,
        &format_amount(result.total_amount_cents, result.currency.as_deref()),
    ));
    lines.join("\n") + "\n"
}

pub async fn run<W: Write, S: ConnectionStore>(
    writer: &mut W,
    service: &ConnectionService<S>,
    user_id: &UserId,
    args: &EntriesArgs,
) -> Result<()> {
    let query = query_from_args(args);
    let result = service
        .get_time_entries(user_id, &args.provider, &query)
        .await?;
    if args.json {
        return write_json(writer, &result);
    }
    write!(writer, "{}", format_result(&result))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{GOOD_TOKEN, stub_service, user};
    use chrono::NaiveDate;
    use insta::assert_snapshot;
    use tally_core::{Dimension, RoundingDirection};

    fn args() -> EntriesArgs {
        EntriesArgs {
            provider: "stub".to_string(),
            workspace: "100".to_string(),
            start: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 4, 13).unwrap(),
            project: None,
            group_by: Dimension::Project,
            sub_group_by: Dimension::Description,
            round: None,
            round_direction: RoundingDirection::Nearest,
            billable_only: false,
            json: false,
        }
    }

    #[test]
    fn round_flag_builds_override() {
        let mut args = args();
        assert_eq!(query_from_args(&args).rounding, None);
        args.round = Some(15);
        args.round_direction = RoundingDirection::Up;
        assert_eq!(
            query_from_args(&args).rounding,
            Some(Rounding::new(RoundingDirection::Up, 15))
        );
    }

    #[tokio::test]
    async fn billable_entries_rounded_to_quarter_hours() {
        let service = stub_service();
        service.connect(&user(), "stub", GOOD_TOKEN).await.unwrap();
        let mut args = args();
        args.billable_only = true;
        args.round = Some(15);

        let mut output = Vec::new();
        run(&mut output, &service, &user(), &args).await.unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Website                          1h 30m  EUR 180.00
          Build                             30m  EUR 60.00
          Design                          1h 0m  EUR 120.00

        Total                            1h 30m  EUR 180.00
        ");
    }

    #[tokio::test]
    async fn json_output_is_the_result() {
        let service = stub_service();
        service.connect(&user(), "stub", GOOD_TOKEN).await.unwrap();
        let mut args = args();
        args.json = true;

        let mut output = Vec::new();
        run(&mut output, &service, &user(), &args).await.unwrap();
        let result: TimeEntriesResult = serde_json::from_slice(&output).unwrap();
        assert_eq!(result.total_seconds, 4 * 37 * 60);
        assert_eq!(result.groups[0].items.len(), 3);
    }

    #[tokio::test]
    async fn unsupported_grouping_is_rejected() {
        let service = stub_service();
        service.connect(&user(), "stub", GOOD_TOKEN).await.unwrap();
        let mut args = args();
        args.group_by = Dimension::Client;

        let mut output = Vec::new();
        let err = run(&mut output, &service, &user(), &args).await.unwrap_err();
        assert_eq!(err.to_string(), "stub does not support grouping by client");
    }

    #[test]
    fn empty_result_has_a_message() {
        assert_eq!(
            format_result(&TimeEntriesResult::default()),
            "No time entries in range.\n"
        );
    }
}
