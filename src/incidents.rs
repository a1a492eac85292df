use crate::models::ReasonCode;

/// What the engine decided to do in response to one new check, given the
/// previous check's status and whether an incident is currently open.
/// Kept as a pure decision separate from the database write so the
/// transition table itself is testable without a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentAction {
    Open,
    Close,
    NoOp,
}

/// The per-target state machine is `Unknown -> Up -> Down -> Up -> ...`.
/// `prev_up` is `None` when this is the target's first check.
///
/// The `false, false` case (down while already down, no incident open) is
/// kept distinct from `true/None -> false` rather than folded together —
/// it exists to recover from a transaction that inserted a down check
/// without also opening the incident.
pub fn decide_transition(prev_up: Option<bool>, curr_up: bool, has_open: bool) -> IncidentAction {
    match (prev_up, curr_up, has_open) {
        (_, false, false) => IncidentAction::Open,
        (_, false, true) => IncidentAction::NoOp,
        (Some(false), true, true) => IncidentAction::Close,
        (_, true, _) => IncidentAction::NoOp,
    }
}

pub struct OpenIncident {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub reason_code: ReasonCode,
    pub reason_message: Option<String>,
    pub start_check_id: i64,
}

pub struct ClosedIncident {
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub duration_seconds: i64,
    pub recovery_check_id: i64,
}

pub fn close_incident(
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: chrono::DateTime<chrono::Utc>,
    recovery_check_id: i64,
) -> ClosedIncident {
    let duration_seconds = (ended_at - started_at).num_seconds().max(0);
    ClosedIncident {
        ended_at,
        duration_seconds,
        recovery_check_id,
    }
}
