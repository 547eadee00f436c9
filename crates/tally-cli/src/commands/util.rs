//! Shared utilities for CLI commands.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

/// Formats seconds as a duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
pub fn format_duration(seconds: i64) -> String {
    let total_minutes = seconds.max(0) / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats minor units as `CUR 12.34`; `-` when the amount is unknown.
pub fn format_amount(cents: Option<i64>, currency: Option<&str>) -> String {
    let Some(cents) = cents else {
        return "-".to_string();
    };
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let value = format!("{sign}{}.{:02}", abs / 100, abs % 100);
    match currency {
        Some(currency) => format!("{currency} {value}"),
        None => value,
    }
}

/// Truncates by characters, not bytes, to avoid panics on multi-byte UTF-8.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        format!("{}...", text.chars().take(width.saturating_sub(3)).collect::<String>())
    } else {
        text.to_string()
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_show_hours_and_minutes() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(59), "0m");
        assert_eq!(format_duration(30 * 60), "30m");
        assert_eq!(format_duration(90 * 60), "1h 30m");
        assert_eq!(format_duration(-5), "0m");
    }

    #[test]
    fn amounts_keep_two_decimals() {
        assert_eq!(format_amount(Some(18_000), Some("EUR")), "EUR 180.00");
        assert_eq!(format_amount(Some(5), None), "0.05");
        assert_eq!(format_amount(Some(-250), Some("USD")), "USD -2.50");
        assert_eq!(format_amount(None, Some("EUR")), "-");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("Über-Projekt Nummer Eins", 12), "Über-Proj...");
        assert_eq!(truncate("short", 12), "short");
    }
}
