//! Grouping, rounding and totalling of normalized time entries.
//!
//! # Algorithm Summary
//!
//! 1. Drop entries failing the billable-only and project filters
//! 2. Round every remaining entry on its own, before grouping
//! 3. Bucket by the grouping label, then by the subgrouping label
//! 4. Total each subgroup bucket into a [`TimeEntryItem`]
//! 5. Roll items up into [`TimeEntryGroup`]s and groups into the result
//!
//! Money is only totalled where it is unambiguous. An item has an amount
//! when all of its entries share one rate and one currency; a group or the
//! grand total has one when every child has an amount and all children share
//! a currency. Anything else is `None`, never a blended figure. Providers
//! without rate support get `Some(0)` at group and result level.
//!
//! Capability checks happen before a provider is called and are not repeated
//! here; see [`Capabilities::check`](crate::Capabilities::check).

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::types::{
    Dimension, RawTimeEntry, Rounding, TimeEntriesQuery, TimeEntriesResult, TimeEntryGroup,
    TimeEntryItem,
};

const SECONDS_PER_HOUR: i128 = 3_600;

/// Inputs that do not come from the query itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSettings {
    /// Rounding applied to each entry.
    pub rounding: Rounding,
    /// Whether the provider declares billable-rate support.
    pub rates_supported: bool,
}

/// Picks the query's rounding override, else the workspace's own setting.
pub fn effective_rounding(query: &TimeEntriesQuery, workspace: Option<Rounding>) -> Rounding {
    query.rounding.or(workspace).unwrap_or(Rounding::NONE)
}

/// A rounded entry inside a bucket.
#[derive(Debug, Clone, Copy)]
struct Contribution<'a> {
    seconds: i64,
    rate_cents: Option<i64>,
    currency: Option<&'a str>,
}

type Buckets<'a> = BTreeMap<&'a str, BTreeMap<&'a str, Vec<Contribution<'a>>>>;

/// Groups and totals `entries` for `query`.
pub fn aggregate(
    entries: &[RawTimeEntry],
    query: &TimeEntriesQuery,
    settings: AggregationSettings,
) -> TimeEntriesResult {
    let mut buckets: Buckets<'_> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| passes_filters(entry, query)) {
        let contribution = Contribution {
            seconds: settings.rounding.apply(entry.duration_seconds),
            rate_cents: entry.rate_cents,
            currency: entry.currency.as_deref(),
        };
        buckets
            .entry(entry.label(query.grouping))
            .or_default()
            .entry(entry.label(query.sub_grouping))
            .or_default()
            .push(contribution);
    }

    let groups: Vec<TimeEntryGroup> = buckets
        .into_iter()
        .map(|(title, sub_buckets)| {
            let items = sub_buckets
                .into_iter()
                .map(|(label, contributions)| build_item(label, &contributions))
                .collect();
            build_group(query.grouping, title, items, settings.rates_supported)
        })
        .collect();

    let total_seconds = groups.iter().map(|group| group.total_seconds).sum();
    let currency = uniform(groups.iter().map(|group| group.currency.as_deref()))
        .flatten()
        .map(str::to_string);
    let total_amount_cents = roll_up(
        groups
            .iter()
            .map(|group| (group.total_amount_cents, group.currency.as_deref())),
        settings.rates_supported,
    );

    TimeEntriesResult {
        groups,
        total_seconds,
        total_amount_cents,
        currency,
    }
}

fn passes_filters(entry: &RawTimeEntry, query: &TimeEntriesQuery) -> bool {
    if query.billable_only && entry.billable != Some(true) {
        return false;
    }
    if let Some(project_id) = query.project_id.as_deref() {
        let entry_project = entry.project.as_ref().map(|project| project.id.as_str());
        if entry_project != Some(project_id) {
            return false;
        }
    }
    true
}

fn build_item(label: &str, contributions: &[Contribution<'_>]) -> TimeEntryItem {
    let total_seconds = contributions.iter().map(|c| c.seconds).sum();
    let rate_cents = uniform(contributions.iter().map(|c| c.rate_cents)).flatten();
    let currency = uniform(contributions.iter().map(|c| c.currency)).flatten();
    let total_amount_cents = match (rate_cents, currency) {
        (Some(rate), Some(_)) => amount_cents(rate, total_seconds),
        _ => None,
    };

    TimeEntryItem {
        label: label.to_string(),
        total_seconds,
        total_amount_cents,
        rate_cents,
        currency: currency.map(str::to_string),
        entry_count: contributions.len(),
    }
}

fn build_group(
    dimension: Dimension,
    title: &str,
    items: Vec<TimeEntryItem>,
    rates_supported: bool,
) -> TimeEntryGroup {
    let total_seconds = items.iter().map(|item| item.total_seconds).sum();
    let total_amount_cents = roll_up(
        items
            .iter()
            .map(|item| (item.total_amount_cents, item.currency.as_deref())),
        rates_supported,
    );
    let currency = uniform(items.iter().map(|item| item.currency.as_deref()))
        .flatten()
        .map(str::to_string);

    TimeEntryGroup {
        id: group_id(dimension, title),
        title: title.to_string(),
        items,
        total_seconds,
        total_amount_cents,
        currency,
    }
}

/// Sums child amounts when every child has one and they share a currency.
///
/// No children sum to zero.
fn roll_up<'a>(
    children: impl Iterator<Item = (Option<i64>, Option<&'a str>)>,
    rates_supported: bool,
) -> Option<i64> {
    if !rates_supported {
        return Some(0);
    }
    let mut total = 0_i64;
    let mut shared_currency: Option<Option<&str>> = None;
    for (amount, currency) in children {
        let amount = amount?;
        let currency = Some(currency?);
        match shared_currency {
            None => shared_currency = Some(currency),
            Some(shared) if shared != currency => return None,
            Some(_) => {}
        }
        total = total.checked_add(amount)?;
    }
    Some(total)
}

/// Returns the single value every element shares, `None` if they differ or
/// there are none.
fn uniform<T: PartialEq>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    for value in values {
        if value != first {
            return None;
        }
    }
    Some(first)
}

/// `rate × hours`, rounded half up to the nearest minor unit.
///
/// `None` when the amount does not fit in an `i64`.
fn amount_cents(rate_cents: i64, seconds: i64) -> Option<i64> {
    let raw = i128::from(rate_cents) * i128::from(seconds);
    let rounded = (raw + SECONDS_PER_HOUR / 2).div_euclid(SECONDS_PER_HOUR);
    i64::try_from(rounded).ok()
}

fn group_id(dimension: Dimension, label: &str) -> String {
    let content = format!("group|{dimension}|{label}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}
