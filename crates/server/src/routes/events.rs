//! Live operator stream over server-sent events.

use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Sse},
    routing::get,
};
use futures::StreamExt;

use crate::{middleware::RequireStaff, services::to_sse, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/staff/events", get(stream_events))
}

/// Open a live stream of `order-created` and `order-updated` events.
///
/// The stream starts with a `connected` event and carries a `heartbeat`
/// comment while idle. It does not replay past events; clients fetch
/// `/staff/orders` after (re)connecting.
pub async fn stream_events(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let connection = state.streams().open(&staff);
    let frames = connection.frames().map(|frame| to_sse(&frame));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(frames),
    )
}
