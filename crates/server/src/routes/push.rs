//! Push destination registration handlers.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use orderdesk_core::Locale;

use crate::{
    error::AppError,
    middleware::RequireStaff,
    models::{DestinationKind, PushDestination},
    services::push::registration::{
        RegistrationRequest, SubscriptionRegistration, TokenRegistration, register, unregister,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/staff/push/token",
            post(register_token).delete(unregister_token),
        )
        .route(
            "/staff/push/subscription",
            post(register_subscription).delete(unregister_subscription),
        )
        .route("/staff/push/vapid-public-key", get(vapid_public_key))
}

/// Response for a stored destination.
#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub success: bool,
    pub kind: DestinationKind,
    pub locale: Locale,
}

impl From<PushDestination> for RegisteredResponse {
    fn from(destination: PushDestination) -> Self {
        Self {
            success: true,
            kind: destination.kind(),
            locale: destination.locale().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnregisteredResponse {
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UnregisterSubscriptionRequest {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct VapidKeyResponse {
    pub public_key: String,
}

/// Register (or replace) an FCM registration token for this device.
///
/// # Errors
///
/// Returns 422 for a blank or malformed token or an unknown locale.
pub async fn register_token(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<TokenRegistration>,
) -> Result<Json<RegisteredResponse>, AppError> {
    let destination = register(
        state.destinations(),
        RegistrationRequest::Token(body),
        &state.config().push.default_locale,
        Some(staff.id),
    )
    .await?;
    Ok(Json(destination.into()))
}

/// Remove an FCM registration token.
///
/// # Errors
///
/// Returns 422 for a blank token.
pub async fn unregister_token(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<UnregisterTokenRequest>,
) -> Result<Json<UnregisteredResponse>, AppError> {
    let removed = unregister(state.destinations(), &body.token).await?;
    Ok(Json(UnregisteredResponse { removed }))
}

/// Register (or replace) a browser's Web Push subscription.
///
/// # Errors
///
/// Returns 422 for a non-https endpoint or malformed keys.
pub async fn register_subscription(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<SubscriptionRegistration>,
) -> Result<Json<RegisteredResponse>, AppError> {
    let destination = register(
        state.destinations(),
        RegistrationRequest::Subscription(body),
        &state.config().push.default_locale,
        Some(staff.id),
    )
    .await?;
    Ok(Json(destination.into()))
}

/// Remove a Web Push subscription by endpoint.
///
/// # Errors
///
/// Returns 422 for a blank endpoint.
pub async fn unregister_subscription(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<UnregisterSubscriptionRequest>,
) -> Result<Json<UnregisteredResponse>, AppError> {
    let removed = unregister(state.destinations(), &body.endpoint).await?;
    Ok(Json(UnregisteredResponse { removed }))
}

/// VAPID public key browsers pass to `pushManager.subscribe`.
///
/// # Errors
///
/// Returns 404 when Web Push is not configured.
pub async fn vapid_public_key(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
) -> Result<Json<VapidKeyResponse>, AppError> {
    let public_key = state
        .vapid_public_key()
        .ok_or_else(|| AppError::NotFound("web push is not enabled".to_string()))?;
    Ok(Json(VapidKeyResponse {
        public_key: public_key.to_string(),
    }))
}
