//! Health check handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
}

/// Readiness report.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    /// `ok`, `unreachable`, or `memory` when running without a database.
    pub database: &'static str,
    pub live_connections: usize,
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the database when one is configured. Returns 503 Service Unavailable
/// if it is not reachable.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let live_connections = state.streams().connection_count();

    let database = match state.pool() {
        None => "memory",
        Some(pool) => match sqlx::query("SELECT 1").fetch_one(pool).await {
            Ok(_) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "readiness database ping failed");
                "unreachable"
            }
        },
    };

    let (code, status) = if database == "unreachable" {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            database,
            live_connections,
        }),
    )
}
