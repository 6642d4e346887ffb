use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod handlers;
mod models;
mod views;

use api::{ReportSource, ReportsClient};

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: config::AppConfig,
    /// Where every page render pulls its report data from. Nothing is cached
    /// between requests.
    pub reports: Arc<dyn ReportSource>,
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard::dashboard))
        // Liveness probe, never touches the reporting API
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ezsend_dashboard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting eZSend dashboard on {}:{}", config.host, config.port);
    tracing::info!("Reporting API: {}", config.api_base_url);

    let reports = Arc::new(ReportsClient::new(&config));
    let bind_addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(AppState { config, reports });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
