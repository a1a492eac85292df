mod dashboard;
mod system;
mod targets;

pub use dashboard::dashboard;
pub use system::health;
pub use targets::{
    create_target, delete_target, get_target_history, get_target_incidents,
    get_target_reliability, list_targets, manual_check,
};

pub(crate) const MAX_HISTORY_LIMIT: i64 = 500;
pub(crate) const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub(crate) const MAX_INCIDENTS_LIMIT: i64 = 300;
pub(crate) const DEFAULT_INCIDENTS_LIMIT: i64 = 50;

pub(crate) fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> Result<i64, crate::errors::ApiError> {
    match requested {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(crate::errors::bad_request(format!(
            "limit must be between 1 and {max}"
        ))),
    }
}
