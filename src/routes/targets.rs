use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::errors::{bad_request, ApiError};
use crate::models::{Check, CreateTarget, CreateTargetRequest, Incident, ReliabilitySummary, TargetSummary};
use crate::scheduler::Scheduler;

use super::{clamp_limit, DEFAULT_HISTORY_LIMIT, DEFAULT_INCIDENTS_LIMIT, MAX_HISTORY_LIMIT, MAX_INCIDENTS_LIMIT};

/// Validates a raw request and applies the configured interval/timeout
/// defaults for any field the caller omitted. A missing or empty `name`/
/// `url` both resolve here, not in the JSON data guard, so every
/// malformed-input case produces the same 400 response.
fn validate(input: &CreateTargetRequest, config: &Config) -> Result<CreateTarget, ApiError> {
    let name = input.name.as_deref().unwrap_or("").trim();
    if name.is_empty() {
        return Err(bad_request("name is required"));
    }
    let url = input.url.as_deref().unwrap_or("").trim();
    if url.is_empty() {
        return Err(bad_request("url is required"));
    }
    let lower = url.to_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(bad_request("url must start with http:// or https://"));
    }
    let authority = lower
        .trim_start_matches("http://")
        .trim_start_matches("https://");
    if authority.is_empty() {
        return Err(bad_request("url must include a host"));
    }

    let interval_seconds = input.interval_seconds.unwrap_or(config.default_interval_seconds);
    if interval_seconds < 1 {
        return Err(bad_request("interval_seconds must be >= 1"));
    }
    let timeout_seconds = input.timeout_seconds.unwrap_or(config.default_timeout_seconds);
    if !(1..=60).contains(&timeout_seconds) {
        return Err(bad_request("timeout_seconds must be between 1 and 60"));
    }
    if let Some(max_latency) = input.max_latency_ms {
        if max_latency < 1 {
            return Err(bad_request("max_latency_ms must be >= 1"));
        }
    }

    Ok(CreateTarget {
        name: name.to_string(),
        url: url.to_string(),
        interval_seconds,
        timeout_seconds,
        expected_substring: input.expected_substring.clone(),
        expected_json_keys: input.expected_json_keys.clone(),
        max_latency_ms: input.max_latency_ms,
    })
}

#[post("/api/targets", format = "json", data = "<input>")]
pub async fn create_target(
    input: Json<CreateTargetRequest>,
    store: &State<Store>,
    scheduler: &State<Arc<Scheduler>>,
    config: &State<Config>,
) -> Result<(rocket::http::Status, Json<TargetSummary>), ApiError> {
    let data = validate(&input.into_inner(), config)?;

    let target = store.insert_target(&data).await?;

    scheduler.check_one(&target).await.ok();

    let summary = store.select_target_summary_by_id(target.id).await?;
    Ok((rocket::http::Status::Created, Json(summary)))
}

#[get("/api/targets")]
pub async fn list_targets(store: &State<Store>) -> Result<Json<Vec<TargetSummary>>, ApiError> {
    let summaries = store.select_target_summaries().await?;
    Ok(Json(summaries))
}

#[delete("/api/targets/<id>")]
pub async fn delete_target(id: i64, store: &State<Store>) -> Result<Json<serde_json::Value>, ApiError> {
    store.delete_target(id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[post("/api/targets/<id>/check")]
pub async fn manual_check(
    id: i64,
    store: &State<Store>,
    scheduler: &State<Arc<Scheduler>>,
) -> Result<Json<Check>, ApiError> {
    let target = store.select_target_by_id(id).await?;
    let check = scheduler.check_one(&target).await?;
    Ok(Json(check))
}

#[get("/api/targets/<id>/history?<limit>")]
pub async fn get_target_history(
    id: i64,
    limit: Option<i64>,
    store: &State<Store>,
) -> Result<Json<Vec<Check>>, ApiError> {
    store.select_target_by_id(id).await?;
    let limit = clamp_limit(limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT)?;
    let history = store.select_history(id, limit).await?;
    Ok(Json(history))
}

#[get("/api/targets/<id>/incidents?<limit>")]
pub async fn get_target_incidents(
    id: i64,
    limit: Option<i64>,
    store: &State<Store>,
) -> Result<Json<Vec<Incident>>, ApiError> {
    store.select_target_by_id(id).await?;
    let limit = clamp_limit(limit, DEFAULT_INCIDENTS_LIMIT, MAX_INCIDENTS_LIMIT)?;
    let incidents = store.select_incidents(id, limit).await?;
    Ok(Json(incidents))
}

#[get("/api/targets/<id>/reliability")]
pub async fn get_target_reliability(
    id: i64,
    store: &State<Store>,
) -> Result<Json<ReliabilitySummary>, ApiError> {
    store.select_target_by_id(id).await?;
    let summary = store.select_reliability(Some(id)).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateTargetRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn missing_name_key_is_a_400_not_a_422() {
        let config = Config::default();
        let req = request(r#"{"url":"https://example.test"}"#);
        let err = validate(&req, &config).unwrap_err();
        assert_eq!(err.0, rocket::http::Status::BadRequest);
    }

    #[test]
    fn missing_url_key_is_a_400() {
        let config = Config::default();
        let req = request(r#"{"name":"api"}"#);
        let err = validate(&req, &config).unwrap_err();
        assert_eq!(err.0, rocket::http::Status::BadRequest);
    }

    #[test]
    fn omitted_interval_and_timeout_fall_back_to_config_defaults() {
        let config = Config {
            default_interval_seconds: 45,
            default_timeout_seconds: 9,
            ..Config::default()
        };
        let req = request(r#"{"name":"api","url":"https://example.test"}"#);
        let target = validate(&req, &config).unwrap();
        assert_eq!(target.interval_seconds, 45);
        assert_eq!(target.timeout_seconds, 9);
    }

    #[test]
    fn explicit_interval_and_timeout_override_config_defaults() {
        let config = Config::default();
        let req = request(
            r#"{"name":"api","url":"https://example.test","interval_seconds":15,"timeout_seconds":3}"#,
        );
        let target = validate(&req, &config).unwrap();
        assert_eq!(target.interval_seconds, 15);
        assert_eq!(target.timeout_seconds, 3);
    }
}
