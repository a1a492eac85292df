use rocket::http::Status;
use rocket::serde::json::Json;
use serde_json::json;

/// Store-layer errors. Routes translate these into HTTP status + body.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a target with that url already exists")]
    DuplicateUrl,
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Shape returned by route handlers on failure, matching the catcher bodies.
pub type ApiError = (Status, Json<serde_json::Value>);

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        Status::BadRequest,
        Json(json!({ "error": msg.into(), "code": "VALIDATION_ERROR" })),
    )
}

pub fn not_found(msg: impl Into<String>) -> ApiError {
    (
        Status::NotFound,
        Json(json!({ "error": msg.into(), "code": "NOT_FOUND" })),
    )
}

pub fn conflict(msg: impl Into<String>) -> ApiError {
    (
        Status::Conflict,
        Json(json!({ "error": msg.into(), "code": "CONFLICT" })),
    )
}

pub fn internal(msg: impl Into<String>) -> ApiError {
    (
        Status::InternalServerError,
        Json(json!({ "error": msg.into(), "code": "INTERNAL_ERROR" })),
    )
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUrl => conflict("a target with that url already exists"),
            StoreError::NotFound => not_found("not found"),
            StoreError::Db(e) => {
                tracing::error!(error = %e, "store error");
                internal("internal server error")
            }
        }
    }
}
