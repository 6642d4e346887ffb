use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// The delivery/send lifecycle events the reporting API tallies per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    DeliveryChannel,
    DeliveryFailure,
    DeliveryUser,
    SentSuccess,
    SentFailure,
}

impl EventName {
    pub fn key(self) -> &'static str {
        match self {
            EventName::DeliveryChannel => "notification:delivery:channel",
            EventName::DeliveryFailure => "notification:delivery:failure",
            EventName::DeliveryUser => "notification:delivery:user",
            EventName::SentSuccess => "notification:sent:success",
            EventName::SentFailure => "notification:sent:failure",
        }
    }
}

/// One tenant's event tallies for the requested date range.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientReport {
    pub subdomain: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Raw tallies as sent. Values are kept untyped so an odd entry under a
    /// key we never read cannot reject the whole report.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: HashMap<String, Value>,
}

impl ClientReport {
    /// Count for `event`, 0 when the API left it out or sent something that
    /// is not a whole number.
    pub fn count(&self, event: EventName) -> i64 {
        self.events.get(event.key()).and_then(as_count).unwrap_or(0)
    }

    pub fn has_event(&self, event: EventName) -> bool {
        self.events.contains_key(event.key())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer counts, plus whole floats like `5.0` that some serializers emit.
fn as_count(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// A single notification returned by the per-client detail query.
///
/// The API does not fix the shape of these rows, so the record keeps every
/// key it was sent (in order) and exposes the derived error flag on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct DetailRecord {
    fields: Map<String, Value>,
}

impl DetailRecord {
    /// `true` when the record carries a non-null `error`.
    pub fn has_error(&self) -> bool {
        matches!(self.fields.get("error"), Some(v) if !v.is_null())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Inclusive calendar range the reports are queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `startDate` as the reporting API expects it (`dd/mm/yyyy`).
    pub fn start_param(&self) -> String {
        self.start.format("%d/%m/%Y").to_string()
    }

    /// `endDate` as the reporting API expects it (`dd/mm/yyyy`).
    pub fn end_param(&self) -> String {
        self.end.format("%d/%m/%Y").to_string()
    }
}
