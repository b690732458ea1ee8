//! Session probe.

use axum::{Json, Router, routing::get};

use crate::{middleware::RequireStaff, models::CurrentStaff, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/staff/session", get(current_session))
}

/// Return the logged-in staff member, or 401.
///
/// Reconnecting stream clients call this to tell an expired session from a
/// network failure.
pub async fn current_session(RequireStaff(staff): RequireStaff) -> Json<CurrentStaff> {
    Json(staff)
}
