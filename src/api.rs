use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::models::{ClientReport, DateRange, DetailRecord};

const REPORTS_PATH: &str = "/events/internal/reports";

// ── Errors ─────────────────────────────────────────────────────────────────

/// Anything that kept a report query from producing results.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reporting API answered {0}")]
    Status(StatusCode),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

// ── Source seam ────────────────────────────────────────────────────────────

/// Where the dashboard gets its report data from.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_aggregate_reports(
        &self,
        range: &DateRange,
    ) -> Result<Vec<ClientReport>, RetrievalError>;

    async fn fetch_detail_reports(
        &self,
        range: &DateRange,
        client_id: &str,
    ) -> Result<Vec<DetailRecord>, RetrievalError>;
}

// ── Response shape ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ReportsResponse {
    results: Vec<Value>,
}

// ── HTTP client ────────────────────────────────────────────────────────────

/// Client for the eZSend internal reports endpoint.
#[derive(Debug, Clone)]
pub struct ReportsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReportsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// GET the reports endpoint with `params` and return the raw `results`
    /// elements.
    async fn get_results(&self, params: &[(&str, String)]) -> Result<Vec<Value>, RetrievalError> {
        let url = format!("{}{}", self.base_url, REPORTS_PATH);

        let mut req = self.http.get(&url).query(params);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RetrievalError::Status(status));
        }

        let body = resp.bytes().await?;
        let parsed: ReportsResponse =
            serde_json::from_slice(&body).map_err(|e| RetrievalError::Decode(e.to_string()))?;

        Ok(parsed.results)
    }
}

#[async_trait]
impl ReportSource for ReportsClient {
    async fn fetch_aggregate_reports(
        &self,
        range: &DateRange,
    ) -> Result<Vec<ClientReport>, RetrievalError> {
        let results = self
            .get_results(&[
                ("startDate", range.start_param()),
                ("endDate", range.end_param()),
            ])
            .await?;

        tracing::debug!("aggregate query returned {} result(s)", results.len());
        Ok(decode_each(results, "client report"))
    }

    async fn fetch_detail_reports(
        &self,
        range: &DateRange,
        client_id: &str,
    ) -> Result<Vec<DetailRecord>, RetrievalError> {
        let results = self
            .get_results(&[
                ("clientId", client_id.to_owned()),
                ("startDate", range.start_param()),
                ("endDate", range.end_param()),
            ])
            .await?;

        tracing::debug!(
            "detail query for client {} returned {} result(s)",
            client_id,
            results.len()
        );
        Ok(decode_each(results, "detail record"))
    }
}

// ── Internal helpers ───────────────────────────────────────────────────────

/// Decode every element that fits `T`, logging and dropping the rest so one
/// bad row does not blank the whole report.
fn decode_each<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| {
            serde_json::from_value(v)
                .map_err(|e| tracing::warn!("skipping malformed {} at index {}: {}", what, i, e))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, api_key: Option<&str>) -> ReportsClient {
        let config = AppConfig {
            api_base_url: server.uri(),
            api_key: api_key.map(str::to_owned),
            host: "127.0.0.1".into(),
            port: 0,
            default_lookback_days: 1,
        };
        ReportsClient::new(&config)
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        )
    }

    #[tokio::test]
    async fn aggregate_query_sends_dates_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .and(query_param("startDate", "01/05/2024"))
            .and(query_param("endDate", "02/05/2024"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "subdomain": "acme",
                        "clientId": "1",
                        "events": { "notification:sent:success": 5 }
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reports = client_for(&server, Some("secret"))
            .fetch_aggregate_reports(&range())
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].subdomain, "acme");
        assert_eq!(reports[0].client_id, "1");
    }

    #[tokio::test]
    async fn detail_query_scopes_by_client_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .and(query_param("clientId", "42"))
            .and(query_param("startDate", "01/05/2024"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "notificationId": "n1", "error": null },
                    { "notificationId": "n2", "error": "boom" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = client_for(&server, None)
            .fetch_detail_reports(&range(), "42")
            .await
            .unwrap();

        assert_eq!(details.len(), 2);
        assert!(!details[0].has_error());
        assert!(details[1].has_error());
    }

    #[tokio::test]
    async fn non_success_status_is_retrieval_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .fetch_aggregate_reports(&range())
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Status(s) if s == StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn body_without_results_is_retrieval_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("secret"))
            .fetch_aggregate_reports(&range())
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Decode(_)));
    }

    #[tokio::test]
    async fn unknown_event_shapes_keep_the_client() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "subdomain": "acme",
                        "clientId": "1",
                        "events": {
                            "notification:sent:success": 5,
                            "notification:meta": { "note": "x" }
                        }
                    },
                    { "subdomain": "beta", "clientId": "2", "events": null }
                ]
            })))
            .mount(&server)
            .await;

        let reports = client_for(&server, Some("secret"))
            .fetch_aggregate_reports(&range())
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].subdomain, "acme");
        assert_eq!(reports[0].count(crate::models::EventName::SentSuccess), 5);
        assert!(reports[1].events.is_empty());
    }

    #[tokio::test]
    async fn malformed_elements_are_skipped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(REPORTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "clientId": "no-subdomain" },
                    { "subdomain": "beta", "clientId": "2", "events": {} },
                    "not an object"
                ]
            })))
            .mount(&server)
            .await;

        let reports = client_for(&server, Some("secret"))
            .fetch_aggregate_reports(&range())
            .await
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].subdomain, "beta");
    }
}
