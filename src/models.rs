use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of reasons a check can be marked down. `None` iff `is_up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Timeout,
    DnsError,
    SslError,
    ConnectionError,
    UnknownError,
    Http4xx,
    Http5xx,
    LatencyExceeded,
    ContentMismatch,
    InvalidJson,
    JsonSchemaMismatch,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Timeout => "timeout",
            ReasonCode::DnsError => "dns_error",
            ReasonCode::SslError => "ssl_error",
            ReasonCode::ConnectionError => "connection_error",
            ReasonCode::UnknownError => "unknown_error",
            ReasonCode::Http4xx => "http_4xx",
            ReasonCode::Http5xx => "http_5xx",
            ReasonCode::LatencyExceeded => "latency_exceeded",
            ReasonCode::ContentMismatch => "content_mismatch",
            ReasonCode::InvalidJson => "invalid_json",
            ReasonCode::JsonSchemaMismatch => "json_schema_mismatch",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_substring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_json_keys: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Raw wire shape for `POST /api/targets`. Every optional field defers its
/// default to `validate()` rather than to serde, so a missing key and an
/// empty value are both ordinary data, not a guard rejection — `validate()`
/// turns this into a `CreateTarget` and is the only place that produces a
/// 400 response.
#[derive(Debug, Deserialize)]
pub struct CreateTargetRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub interval_seconds: Option<i32>,
    pub timeout_seconds: Option<i32>,
    pub expected_substring: Option<String>,
    pub expected_json_keys: Option<Vec<String>>,
    pub max_latency_ms: Option<i32>,
}

/// A validated, fully-defaulted target creation request, ready for
/// `Store::insert_target`.
#[derive(Debug, Clone)]
pub struct CreateTarget {
    pub name: String,
    pub url: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    pub expected_substring: Option<String>,
    pub expected_json_keys: Option<Vec<String>>,
    pub max_latency_ms: Option<i32>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Check {
    pub id: i64,
    pub target_id: i64,
    pub checked_at: DateTime<Utc>,
    pub status_code: Option<i32>,
    pub latency_ms: Option<i32>,
    pub is_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Incident {
    pub id: i64,
    pub target_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub is_resolved: bool,
    pub reason_code: Option<ReasonCode>,
    pub reason_message: Option<String>,
    pub start_check_id: i64,
    pub recovery_check_id: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TargetSummary {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub interval_seconds: i32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_is_up: Option<bool>,
    pub last_status_code: Option<i32>,
    pub last_latency_ms: Option<i32>,
    pub last_reason_code: Option<ReasonCode>,
    pub last_error_message: Option<String>,
    pub uptime_24h: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_targets: i64,
    pub up_now: i64,
    pub down_now: i64,
    pub unknown_now: i64,
    pub avg_uptime_24h: Option<f64>,
    pub incident_summary: ReliabilitySummary,
    pub targets: Vec<TargetSummary>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LastIncident {
    pub id: i64,
    pub target_id: i64,
    pub target_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_resolved: bool,
    pub reason_code: Option<ReasonCode>,
    pub reason_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReliabilitySummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_incident: Option<LastIncident>,
    pub mttr_seconds: Option<f64>,
    pub mtbf_seconds: Option<f64>,
    pub incidents_day: i64,
    pub incidents_week: i64,
    pub incidents_month: i64,
}
