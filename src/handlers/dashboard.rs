use crate::{
    api::ReportSource,
    models::{ClientReport, DateRange, DetailRecord},
    views::{self, AggregateView, ClientView, DetailView},
    AppState,
};
use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;
use std::sync::Arc;

/// Date format used by the HTML date pickers.
const PICKER_DATE_FORMAT: &str = "%Y-%m-%d";

// ── Report modes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    General,
    Client,
    Events,
}

impl ReportMode {
    const ALL: [ReportMode; 3] = [ReportMode::General, ReportMode::Client, ReportMode::Events];

    /// Unknown or missing values fall back to the general report.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("client") => ReportMode::Client,
            Some("events") => ReportMode::Events,
            _ => ReportMode::General,
        }
    }

    fn slug(self) -> &'static str {
        match self {
            ReportMode::General => "general",
            ReportMode::Client => "client",
            ReportMode::Events => "events",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ReportMode::General => "Relatório Geral",
            ReportMode::Client => "Relatório por Cliente",
            ReportMode::Events => "Eventos Detalhados",
        }
    }
}

// ── Query string ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    mode: Option<String>,
    start: Option<String>,
    end: Option<String>,
    subdomain: Option<String>,
}

// ── Page context ───────────────────────────────────────────────────────────

/// Error and warning banners shown above the report.
#[derive(Debug, Default)]
struct Notices {
    errors: Vec<String>,
    warnings: Vec<String>,
}

struct ModeOption {
    slug: &'static str,
    label: &'static str,
    active: bool,
}

struct ClientOption {
    subdomain: String,
    selected: bool,
}

/// Subdomain selector for the per-client modes.
struct ClientPicker {
    label: &'static str,
    options: Vec<ClientOption>,
}

impl ClientPicker {
    /// Offer every subdomain in API order. The requested subdomain stays
    /// selected only while it is still on offer; otherwise the first option
    /// takes over.
    fn new(label: &'static str, reports: &[ClientReport], requested: Option<&str>) -> Self {
        let keep_requested = requested
            .map(|wanted| reports.iter().any(|r| r.subdomain == wanted))
            .unwrap_or(false);

        let mut selected_one = false;
        let options = reports
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let selected = !selected_one
                    && if keep_requested {
                        Some(r.subdomain.as_str()) == requested
                    } else {
                        i == 0
                    };
                selected_one |= selected;
                ClientOption {
                    subdomain: r.subdomain.clone(),
                    selected,
                }
            })
            .collect();

        Self { label, options }
    }

    fn selected(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.selected)
            .map(|o| o.subdomain.as_str())
    }
}

struct Sidebar {
    modes: Vec<ModeOption>,
    start: String,
    end: String,
    picker: Option<ClientPicker>,
}

impl Sidebar {
    fn new(mode: ReportMode, range: &DateRange, picker: Option<ClientPicker>) -> Self {
        Self {
            modes: ReportMode::ALL
                .iter()
                .map(|m| ModeOption {
                    slug: m.slug(),
                    label: m.label(),
                    active: *m == mode,
                })
                .collect(),
            start: range.start.format(PICKER_DATE_FORMAT).to_string(),
            end: range.end.format(PICKER_DATE_FORMAT).to_string(),
            picker,
        }
    }
}

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "general.html")]
struct GeneralTemplate {
    sidebar: Sidebar,
    notices: Notices,
    view: AggregateView,
}

#[derive(Template)]
#[template(path = "client.html")]
struct ClientTemplate {
    sidebar: Sidebar,
    notices: Notices,
    client: Option<ClientView>,
}

#[derive(Template)]
#[template(path = "events.html")]
struct EventsTemplate {
    sidebar: Sidebar,
    notices: Notices,
    subdomain: Option<String>,
    detail: DetailView,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
///
/// One fetch-then-render cycle: resolve the date range, pull the aggregate
/// report fresh from the API, then build whichever view the mode asks for.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let mode = ReportMode::from_param(query.mode.as_deref());
    let mut notices = Notices::default();

    let today = Local::now().date_naive();
    let range = resolve_range(&query, today, state.config.default_lookback_days, &mut notices);

    tracing::info!(
        "Rendering {} report for {} to {}",
        mode.slug(),
        range.start_param(),
        range.end_param()
    );

    let reports = load_aggregate(state.reports.as_ref(), &range, &mut notices).await;

    match mode {
        ReportMode::General => GeneralTemplate {
            view: views::build_aggregate(&reports),
            sidebar: Sidebar::new(mode, &range, None),
            notices,
        }
        .into_response(),

        ReportMode::Client => {
            let picker = ClientPicker::new(
                "Buscar Cliente (subdomain):",
                &reports,
                query.subdomain.as_deref(),
            );
            let client = picker
                .selected()
                .and_then(|subdomain| views::build_client(&reports, subdomain));

            ClientTemplate {
                sidebar: Sidebar::new(mode, &range, Some(picker)),
                notices,
                client,
            }
            .into_response()
        }

        ReportMode::Events => {
            let picker =
                ClientPicker::new("Escolha o Cliente:", &reports, query.subdomain.as_deref());
            let subdomain = picker.selected().map(str::to_owned);

            let detail = match subdomain
                .as_deref()
                .and_then(|s| views::find_client(&reports, s))
            {
                Some(report) => {
                    let records = load_detail(
                        state.reports.as_ref(),
                        &range,
                        &report.client_id,
                        &mut notices,
                    )
                    .await;
                    views::build_detail(&records)
                }
                None => DetailView::NoClient,
            };

            EventsTemplate {
                sidebar: Sidebar::new(mode, &range, Some(picker)),
                notices,
                subdomain,
                detail,
            }
            .into_response()
        }
    }
}

// ── Private helpers ────────────────────────────────────────────────────────

/// Read the requested range, falling back to `today - lookback ..= today`
/// for any bound that is absent or unreadable. Inverted ranges are passed
/// through; the API decides what they mean.
fn resolve_range(
    query: &ReportQuery,
    today: NaiveDate,
    lookback_days: u32,
    notices: &mut Notices,
) -> DateRange {
    let default_start = today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(today);

    let start = parse_picker_date(query.start.as_deref(), "Data Início", notices)
        .unwrap_or(default_start);
    let end = parse_picker_date(query.end.as_deref(), "Data Fim", notices).unwrap_or(today);

    DateRange::new(start, end)
}

fn parse_picker_date(raw: Option<&str>, field: &str, notices: &mut Notices) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, PICKER_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            notices
                .warnings
                .push(format!("{field} inválida ({raw}); usando o padrão."));
            None
        }
    }
}

/// Fetch the aggregate report, turning a failure into an error banner and an
/// empty result.
async fn load_aggregate(
    source: &dyn ReportSource,
    range: &DateRange,
    notices: &mut Notices,
) -> Vec<ClientReport> {
    match source.fetch_aggregate_reports(range).await {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!("Failed to fetch aggregate reports: {}", e);
            notices
                .errors
                .push(format!("Erro ao buscar dados gerais: {e}"));
            Vec::new()
        }
    }
}

/// Fetch one client's detail rows, turning a failure into an error banner and
/// an empty result.
async fn load_detail(
    source: &dyn ReportSource,
    range: &DateRange,
    client_id: &str,
    notices: &mut Notices,
) -> Vec<DetailRecord> {
    match source.fetch_detail_reports(range, client_id).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Failed to fetch detail reports for {}: {}", client_id, e);
            notices
                .errors
                .push(format!("Erro ao buscar eventos detalhados: {e}"));
            Vec::new()
        }
    }
}
