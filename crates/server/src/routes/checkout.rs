//! Storefront checkout handler.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Serialize;

use orderdesk_core::OrderId;

use crate::{error::AppError, services::CheckoutRequest, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

/// Response for a created order.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_id: OrderId,
}

/// Create an order from the storefront cart.
///
/// Prices and item names come from the catalog; unavailable items are
/// skipped.
///
/// # Errors
///
/// Returns 422 when customer fields are missing or no requested item is
/// available.
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let snapshot = state.lifecycle().create_order(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            order_id: snapshot.order.id,
        }),
    ))
}
