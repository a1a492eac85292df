use rocket::get;
use rocket::serde::json::Json;
use rocket::State;

use crate::db::Store;
use crate::errors::ApiError;
use crate::models::DashboardResponse;

#[get("/api/dashboard")]
pub async fn dashboard(store: &State<Store>) -> Result<Json<DashboardResponse>, ApiError> {
    let targets = store.select_target_summaries().await?;
    let incident_summary = store.select_reliability(None).await?;

    let total_targets = targets.len() as i64;
    let up_now = targets.iter().filter(|t| t.last_is_up == Some(true)).count() as i64;
    let down_now = targets.iter().filter(|t| t.last_is_up == Some(false)).count() as i64;
    let unknown_now = targets.iter().filter(|t| t.last_is_up.is_none()).count() as i64;

    let uptimes: Vec<f64> = targets.iter().filter_map(|t| t.uptime_24h).collect();
    let avg_uptime_24h = if uptimes.is_empty() {
        None
    } else {
        Some((uptimes.iter().sum::<f64>() / uptimes.len() as f64 * 100.0).round() / 100.0)
    };

    Ok(Json(DashboardResponse {
        total_targets,
        up_now,
        down_now,
        unknown_now,
        avg_uptime_24h,
        incident_summary,
        targets,
    }))
}
