//! Authentication extractors for staff routes.
//!
//! Provides extractors for requiring a staff session in route handlers.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::error::{ErrorResponse, set_sentry_user};
use crate::models::{CurrentStaff, session_keys};

/// Extractor that requires a staff member allowed to operate orders.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireStaff(staff): RequireStaff,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", staff.name)
/// }
/// ```
pub struct RequireStaff(pub CurrentStaff);

/// Error returned when a staff session is required.
#[derive(Debug)]
pub enum StaffAuthRejection {
    /// No session, or no staff member in it.
    Unauthorized,
    /// Logged in, but the role may not operate orders.
    Forbidden,
}

impl IntoResponse for StaffAuthRejection {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Not logged in"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Not allowed to operate orders"),
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
            }),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = StaffAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(StaffAuthRejection::Unauthorized)?;

        let staff: CurrentStaff = session
            .get(session_keys::CURRENT_STAFF)
            .await
            .ok()
            .flatten()
            .ok_or(StaffAuthRejection::Unauthorized)?;

        if !staff.role.can_operate_orders() {
            return Err(StaffAuthRejection::Forbidden);
        }

        set_sentry_user(staff.id.as_i64(), &staff.name);
        Ok(Self(staff))
    }
}

/// Helper to set the current staff member in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_STAFF, staff).await
}
