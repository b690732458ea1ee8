//! Staff order handlers: snapshot queries and mutations.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;

use orderdesk_core::{OrderId, OrderStatus};

use crate::{
    error::AppError,
    middleware::RequireStaff,
    models::{OrderFilter, OrderSnapshot},
    services::{CustomerPatch, ItemEdit},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/staff/orders", get(list_orders))
        .route("/staff/orders/{id}", get(order_detail))
        .route("/staff/orders/{id}/status", post(change_status))
        .route("/staff/orders/{id}/items", post(edit_items))
        .route("/staff/orders/{id}/customer", post(edit_customer))
}

/// Query parameters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    /// Defaults to the start of the current UTC day.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderListQuery {
    fn into_filter(self, now: DateTime<Utc>) -> OrderFilter {
        OrderFilter {
            status: self.status,
            since: Some(
                self.since
                    .unwrap_or_else(|| now.date_naive().and_time(NaiveTime::MIN).and_utc()),
            ),
            limit: self.limit,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemEditRequest {
    pub items: Vec<ItemEdit>,
}

/// List order snapshots, newest first.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub async fn list_orders(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderSnapshot>>, AppError> {
    let filter = query.into_filter(Utc::now());
    let orders = state.lifecycle().list(&filter).await?;
    Ok(Json(orders))
}

/// Full snapshot of one order (items and history included).
///
/// # Errors
///
/// Returns 404 for an unknown order.
pub async fn order_detail(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderSnapshot>, AppError> {
    let snapshot = state.lifecycle().snapshot(OrderId::new(id)).await?;
    Ok(Json(snapshot))
}

/// Move an order to a new status.
///
/// # Errors
///
/// Returns 422 for a transition outside the table, 404 for an unknown order.
pub async fn change_status(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<OrderSnapshot>, AppError> {
    let snapshot = state
        .lifecycle()
        .change_status(OrderId::new(id), body.status, body.reason, &staff.actor())
        .await?;
    Ok(Json(snapshot))
}

/// Overwrite item quantities. Zero removes the item.
///
/// # Errors
///
/// Returns 422 for a terminal order, 404 for an unknown order or item.
pub async fn edit_items(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ItemEditRequest>,
) -> Result<Json<OrderSnapshot>, AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("no item edits given".to_string()));
    }

    let snapshot = state
        .lifecycle()
        .edit_items(OrderId::new(id), &body.items, &staff.actor())
        .await?;
    Ok(Json(snapshot))
}

/// Update customer details. Blank or absent fields are left unchanged.
///
/// # Errors
///
/// Returns 422 for a terminal order or an invalid phone number.
pub async fn edit_customer(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<OrderSnapshot>, AppError> {
    let snapshot = state
        .lifecycle()
        .edit_customer(OrderId::new(id), &patch, &staff.actor())
        .await?;
    Ok(Json(snapshot))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_list_defaults_to_start_of_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let filter = OrderListQuery::default().into_filter(now);
        assert_eq!(
            filter.since,
            Some(Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap())
        );
        assert_eq!(filter.status, None);
    }

    #[test]
    fn test_explicit_since_is_kept() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let filter = OrderListQuery {
            status: Some(OrderStatus::Confirmed),
            since: Some(since),
            limit: Some(10),
        }
        .into_filter(now);
        assert_eq!(filter.since, Some(since));
        assert_eq!(filter.status, Some(OrderStatus::Confirmed));
        assert_eq!(filter.limit, Some(10));
    }
}
