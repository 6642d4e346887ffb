//! Builders that shape raw report data into what the dashboard pages show.
//!
//! Everything here is pure: no I/O, no logging. The handlers fetch, these
//! functions reshape.

use serde_json::Value;

use crate::models::{ClientReport, DetailRecord, EventName};

// ── Shared chart type ──────────────────────────────────────────────────────

/// One bar of a horizontal bar chart. `pct` is the bar width relative to the
/// largest value in the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub label: String,
    pub value: i64,
    pub pct: i64,
}

/// Attach a width-percentage to each `(label, value)` pair.
fn with_pct(items: Vec<(String, i64)>) -> Vec<Bar> {
    let max = items.iter().map(|(_, v)| *v).max().unwrap_or(0);
    items
        .into_iter()
        .map(|(label, value)| {
            let pct = if max > 0 {
                (i128::from(value.max(0)) * 100 / i128::from(max)) as i64
            } else {
                0
            };
            Bar { label, value, pct }
        })
        .collect()
}

// ── Aggregate view ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub subdomain: String,
    pub client_id: String,
    pub delivery_channel: i64,
    pub delivery_failure: i64,
    pub delivery_user: i64,
    pub sent_success: i64,
    pub sent_failure: i64,
}

/// Sums shown as the four KPIs above the aggregate table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateTotals {
    pub sent_to_channel: i64,
    pub delivered_to_user: i64,
    pub send_failures: i64,
    pub delivery_failures: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateView {
    pub rows: Vec<AggregateRow>,
    pub totals: AggregateTotals,
    pub chart: Vec<Bar>,
}

/// Per-client table of every tenant with at least one successful send,
/// busiest first, plus column totals over the rows kept.
pub fn build_aggregate(reports: &[ClientReport]) -> AggregateView {
    let mut rows: Vec<AggregateRow> = reports
        .iter()
        .filter(|r| r.has_event(EventName::SentSuccess))
        .map(|r| AggregateRow {
            subdomain: r.subdomain.clone(),
            client_id: r.client_id.clone(),
            delivery_channel: r.count(EventName::DeliveryChannel),
            delivery_failure: r.count(EventName::DeliveryFailure),
            delivery_user: r.count(EventName::DeliveryUser),
            sent_success: r.count(EventName::SentSuccess),
            sent_failure: r.count(EventName::SentFailure),
        })
        .collect();

    // sort_by is stable: ties keep API order
    rows.sort_by(|a, b| b.sent_success.cmp(&a.sent_success));

    let totals = rows
        .iter()
        .fold(AggregateTotals::default(), |mut acc, row| {
            acc.sent_to_channel = acc.sent_to_channel.saturating_add(row.delivery_channel);
            acc.delivered_to_user = acc.delivered_to_user.saturating_add(row.delivery_user);
            acc.send_failures = acc.send_failures.saturating_add(row.sent_failure);
            acc.delivery_failures = acc.delivery_failures.saturating_add(row.delivery_failure);
            acc
        });

    let chart = with_pct(
        rows.iter()
            .map(|r| (r.subdomain.clone(), r.sent_success))
            .collect(),
    );

    AggregateView {
        rows,
        totals,
        chart,
    }
}

// ── Per-client view ────────────────────────────────────────────────────────

/// Category rows in display order.
const CATEGORIES: [(&str, EventName); 5] = [
    ("Enviadas ao Canal", EventName::DeliveryChannel),
    ("Entregues ao Usuário", EventName::DeliveryUser),
    ("Falha na Entrega", EventName::DeliveryFailure),
    ("Falha no Envio", EventName::SentFailure),
    ("Envio com Sucesso", EventName::SentSuccess),
];

/// Headline metrics in display order.
const METRICS: [(&str, EventName); 4] = [
    ("Enviadas", EventName::DeliveryChannel),
    ("Entregues", EventName::DeliveryUser),
    ("Falha Envio", EventName::SentFailure),
    ("Falha Entrega", EventName::DeliveryFailure),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRow {
    pub category: &'static str,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub subdomain: String,
    pub client_id: String,
    pub metrics: Vec<(&'static str, i64)>,
    pub rows: Vec<CategoryRow>,
    pub chart: Vec<Bar>,
}

/// First report whose subdomain matches. Subdomains are not guaranteed
/// unique, so later duplicates are ignored.
pub fn find_client<'a>(reports: &'a [ClientReport], subdomain: &str) -> Option<&'a ClientReport> {
    reports.iter().find(|r| r.subdomain == subdomain)
}

/// Category/quantity breakdown for one tenant, or `None` when no report has
/// that subdomain.
pub fn build_client(reports: &[ClientReport], subdomain: &str) -> Option<ClientView> {
    let report = find_client(reports, subdomain)?;

    let rows: Vec<CategoryRow> = CATEGORIES
        .iter()
        .map(|&(category, event)| CategoryRow {
            category,
            quantity: report.count(event),
        })
        .collect();

    let metrics = METRICS
        .iter()
        .map(|&(label, event)| (label, report.count(event)))
        .collect();

    let chart = with_pct(
        rows.iter()
            .map(|r| (r.category.to_owned(), r.quantity))
            .collect(),
    );

    Some(ClientView {
        subdomain: report.subdomain.clone(),
        client_id: report.client_id.clone(),
        metrics,
        rows,
        chart,
    })
}

// ── Detail view ────────────────────────────────────────────────────────────

pub const ERROR_COLUMN: &str = "erro";

/// Preferred columns for the detail table, in display order.
const DETAIL_COLUMNS: [&str; 5] = [
    "notificationId",
    "whatsappTemplateName",
    "trigger",
    "createdAt",
    ERROR_COLUMN,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailView {
    /// No report matched the selected subdomain.
    NoClient,
    /// The client exists but the API had no notifications for it.
    Empty,
    Table(DetailTable),
}

/// Flatten detail records into a table with the derived `erro` column.
///
/// When every preferred column is present the table is narrowed to exactly
/// those; otherwise every column the API sent is shown as-is.
pub fn build_detail(records: &[DetailRecord]) -> DetailView {
    if records.is_empty() {
        return DetailView::Empty;
    }

    let mut available: Vec<String> = Vec::new();
    for record in records {
        for column in record.columns() {
            if column != ERROR_COLUMN && !available.iter().any(|c| c == column) {
                available.push(column.to_owned());
            }
        }
    }
    available.push(ERROR_COLUMN.to_owned());

    let columns = if DETAIL_COLUMNS
        .iter()
        .all(|wanted| available.iter().any(|c| c == *wanted))
    {
        DETAIL_COLUMNS.iter().map(|c| (*c).to_owned()).collect()
    } else {
        available
    };

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    if column == ERROR_COLUMN {
                        record.has_error().to_string()
                    } else {
                        cell_text(record.get(column))
                    }
                })
                .collect()
        })
        .collect();

    DetailView::Table(DetailTable { columns, rows })
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
