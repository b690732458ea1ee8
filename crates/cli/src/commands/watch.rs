//! Terminal client for the live order stream.
//!
//! Connects to `/staff/events` with a staff session cookie, prints each
//! order event, and refetches today's orders after every (re)connect since
//! the stream does not replay missed events.
//!
//! Reconnection follows [`ReconnectPolicy`]: immediate retries, then a probe
//! of `/staff/session` to tell an expired login from a network failure, then
//! linear backoff while the session is still valid.

use std::pin::pin;

use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use thiserror::Error;
use url::Url;

use orderdesk_core::{ReconnectAction, ReconnectPolicy};
use orderdesk_server::models::OrderSnapshot;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("stream closed by server")]
    Closed,

    #[error("session expired, log in again and pass the new cookie")]
    SessionExpired,
}

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub data: String,
}

/// Take the next complete event (terminated by a blank line) off `buffer`.
fn extract_sse_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    // SSE events are separated by double newlines
    let idx = buffer.windows(2).position(|w| w == b"\n\n")?;
    let rest = buffer.split_off(idx + 2);
    let mut event = std::mem::replace(buffer, rest);
    event.truncate(idx);
    Some(event)
}

/// Parse one raw event. Comment-only events (keepalives) yield `None`.
fn parse_sse_event(raw: &str) -> Option<SseMessage> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }

    Some(SseMessage {
        event,
        data: data.join("\n"),
    })
}

fn describe(snapshot: &OrderSnapshot) -> String {
    let order = &snapshot.order;
    let mut line = format!(
        "#{} {} {} {} ({} items)",
        order.id,
        order.status,
        order.total,
        order.customer.name,
        snapshot.items.len()
    );
    if let Some(reason) = &order.cancel_reason {
        line.push_str(&format!(" reason: {reason}"));
    }
    line
}

#[allow(clippy::print_stdout)]
fn print_message(message: &SseMessage) {
    let event = message.event.as_deref().unwrap_or("message");
    match event {
        "connected" => println!("-- connected"),
        "order-created" | "order-updated" => {
            match serde_json::from_str::<OrderSnapshot>(&message.data) {
                Ok(snapshot) => println!("{event:<14} {}", describe(&snapshot)),
                Err(e) => tracing::warn!(error = %e, event, "undecodable order event"),
            }
        }
        other => println!("{other:<14} {}", message.data),
    }
}

struct StreamClient {
    http: Client,
    cookie: String,
    events_url: Url,
    session_url: Url,
    orders_url: Url,
}

impl StreamClient {
    fn new(base_url: &str, cookie: &str) -> Result<Self, WatchError> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            http: Client::builder().build()?,
            cookie: cookie.to_string(),
            events_url: base.join("/staff/events")?,
            session_url: base.join("/staff/session")?,
            orders_url: base.join("/staff/orders")?,
        })
    }

    /// Whether the session is still accepted. Network failures count as
    /// valid: only the server can say the session is gone.
    async fn probe_session(&self) -> bool {
        match self
            .http
            .get(self.session_url.clone())
            .header(header::COOKIE, &self.cookie)
            .send()
            .await
        {
            Ok(response) => !matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ),
            Err(e) => {
                tracing::debug!(error = %e, "session probe failed");
                true
            }
        }
    }

    #[allow(clippy::print_stdout)]
    async fn resync(&self) -> Result<(), WatchError> {
        let response = self
            .http
            .get(self.orders_url.clone())
            .header(header::COOKIE, &self.cookie)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WatchError::Status(response.status()));
        }

        let orders: Vec<OrderSnapshot> = response.json().await?;
        println!("-- {} orders today", orders.len());
        for snapshot in &orders {
            println!("{:<14} {}", "snapshot", describe(snapshot));
        }
        Ok(())
    }

    /// Read the stream until it fails or closes.
    async fn stream_once(&self, policy: &mut ReconnectPolicy) -> Result<(), WatchError> {
        let response = self
            .http
            .get(self.events_url.clone())
            .header(header::COOKIE, &self.cookie)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WatchError::Status(response.status()));
        }

        policy.on_success();
        self.resync().await?;

        let mut buffer = Vec::new();
        let mut byte_stream = pin!(response.bytes_stream());

        while let Some(chunk) = byte_stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(raw) = extract_sse_event(&mut buffer) {
                match std::str::from_utf8(&raw) {
                    Ok(text) => {
                        if let Some(message) = parse_sse_event(text) {
                            print_message(&message);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "invalid UTF-8 in stream"),
                }
            }
        }

        Err(WatchError::Closed)
    }
}

/// Follow the live stream until the session expires.
///
/// # Errors
///
/// Returns `SessionExpired` once the server rejects the session, or an error
/// for an unusable URL.
pub async fn run(base_url: &str, cookie: &str) -> Result<(), WatchError> {
    let client = StreamClient::new(base_url, cookie)?;
    let mut policy = ReconnectPolicy::default();

    loop {
        if let Err(e) = client.stream_once(&mut policy).await {
            tracing::warn!(error = %e, failures = policy.failures() + 1, "live stream lost");
        }

        let mut action = policy.on_failure();
        loop {
            match action {
                ReconnectAction::RetryNow => break,
                ReconnectAction::ProbeSession => {
                    let valid = client.probe_session().await;
                    action = policy.on_probe(valid);
                }
                ReconnectAction::Backoff(delay) => {
                    tracing::info!(delay_secs = delay.as_secs(), "backing off before reconnect");
                    tokio::time::sleep(delay).await;
                    break;
                }
                ReconnectAction::Reauthenticate => return Err(WatchError::SessionExpired),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sse_event_keeps_partial_tail() {
        let mut buffer = b"event: connected\ndata: {}\n\nevent: order-up".to_vec();

        let first = extract_sse_event(&mut buffer).unwrap();
        assert_eq!(first, b"event: connected\ndata: {}");
        assert_eq!(buffer, b"event: order-up");
        assert!(extract_sse_event(&mut buffer).is_none());
    }

    #[test]
    fn test_parse_event_with_data() {
        let message = parse_sse_event("event: order-updated\ndata: {\"id\":1}").unwrap();
        assert_eq!(message.event.as_deref(), Some("order-updated"));
        assert_eq!(message.data, "{\"id\":1}");
    }

    #[test]
    fn test_heartbeat_comment_is_skipped() {
        assert!(parse_sse_event(": heartbeat").is_none());
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let message = parse_sse_event("data: first\ndata: second").unwrap();
        assert_eq!(message.event, None);
        assert_eq!(message.data, "first\nsecond");
    }
}
