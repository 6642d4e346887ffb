use anyhow::{Context, Result};

const DEFAULT_API_BASE_URL: &str = "https://api.ezsend-one.eteg.app";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the eZSend reporting API, e.g. "https://api.ezsend-one.eteg.app".
    /// Must NOT have a trailing slash.
    pub api_base_url: String,

    /// Value sent in the `x-api-key` header. `None` means requests go out
    /// unauthenticated and the API is expected to answer 401.
    pub api_key: Option<String>,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// How many days before today the date range starts when the page does
    /// not say otherwise.
    pub default_lookback_days: u32,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let default_lookback_days = std::env::var("DEFAULT_LOOKBACK_DAYS")
            .unwrap_or_else(|_| "1".into())
            .parse::<u32>()
            .unwrap_or(1);

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into())
            .trim_end_matches('/')
            .to_owned();

        // The legacy deployment exported the key under the header's own name.
        let api_key = std::env::var("API_KEY")
            .or_else(|_| std::env::var("x-api-key"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() {
            tracing::warn!("API_KEY is not set; reporting API requests will be unauthenticated");
        }

        Ok(Self {
            api_base_url,
            api_key,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            default_lookback_days,
        })
    }
}
