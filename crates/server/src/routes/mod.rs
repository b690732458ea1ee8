//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness (database + live connections)
//!
//! # Storefront
//! POST /checkout                        - Create an order from a cart
//!
//! # Orders (staff session required)
//! GET  /staff/orders                    - Order snapshots (status, since, limit)
//! GET  /staff/orders/{id}               - One order snapshot
//! POST /staff/orders/{id}/status        - Change status (reason for cancellation)
//! POST /staff/orders/{id}/items         - Overwrite item quantities
//! POST /staff/orders/{id}/customer      - Partial customer update
//!
//! # Live stream (staff session required)
//! GET  /staff/events                    - Server-sent order events
//! GET  /staff/session                   - Session probe for reconnecting clients
//!
//! # Push destinations (staff session required)
//! POST   /staff/push/token              - Register an FCM token
//! DELETE /staff/push/token              - Unregister an FCM token
//! POST   /staff/push/subscription       - Register a Web Push subscription
//! DELETE /staff/push/subscription       - Unregister a Web Push subscription
//! GET    /staff/push/vapid-public-key   - VAPID key for browser subscriptions
//! ```

pub mod checkout;
pub mod events;
pub mod health;
pub mod orders;
pub mod push;
pub mod session;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::state::AppState;

/// All routes, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(checkout::router())
        .merge(orders::router())
        .merge(events::router())
        .merge(session::router())
        .merge(push::router())
}

/// Build the full application: routes, session layer, request tracing and
/// Sentry.
pub fn build_router<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    routes()
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
