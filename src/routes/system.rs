use rocket::get;
use rocket::serde::json::Json;
use rocket::State;

use crate::db::Store;
use crate::errors::{internal, ApiError};

#[get("/health")]
pub async fn health(store: &State<Store>) -> Result<Json<serde_json::Value>, ApiError> {
    sqlx::query("SELECT 1")
        .execute(store.pool())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "health check failed");
            internal("database unavailable")
        })?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
