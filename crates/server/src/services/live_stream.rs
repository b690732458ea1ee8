//! Live operator stream.
//!
//! Each connected operator gets a bus subscription and a frame stream:
//! a `connected` frame first, then every lifecycle event in publish order,
//! interleaved with keepalive frames while the stream is idle. A connection
//! whose queue overflows is disconnected by the bus; its stream ends after the
//! queued events and the client is expected to reconnect and refetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::Event;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use orderdesk_core::StaffId;

use crate::events::{EventBus, OrderEvent, Overflow, SubscriberConfig, Subscription};
use crate::models::CurrentStaff;

/// Default interval between keepalive frames.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Default per-connection queue capacity.
pub const DEFAULT_BUFFER: usize = 64;

/// One frame on a live connection.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// First frame on every connection.
    Connected,
    /// A lifecycle event.
    Event(OrderEvent),
    /// Idle keepalive.
    Keepalive,
}

/// Convert a frame to its SSE representation.
///
/// # Errors
///
/// Returns an error if the order snapshot fails to serialize.
pub fn to_sse(frame: &StreamFrame) -> Result<Event, axum::Error> {
    match frame {
        StreamFrame::Connected => Event::default()
            .event("connected")
            .json_data(json!({ "status": "ok" })),
        StreamFrame::Event(event) => Event::default()
            .event(event.topic.as_str())
            .json_data(&*event.order),
        StreamFrame::Keepalive => Ok(Event::default().comment("heartbeat")),
    }
}

/// Registry entry for one open connection.
#[derive(Debug, Clone)]
struct ConnectionInfo {
    id: Uuid,
    staff_id: StaffId,
    staff_name: String,
    opened_at: DateTime<Utc>,
}

struct RegistryInner {
    bus: EventBus,
    connections: Mutex<HashMap<Uuid, ConnectionInfo>>,
    keepalive: Duration,
    buffer: usize,
}

impl RegistryInner {
    fn connections(&self) -> MutexGuard<'_, HashMap<Uuid, ConnectionInfo>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks open live connections.
#[derive(Clone)]
pub struct StreamRegistry {
    inner: Arc<RegistryInner>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new(bus: EventBus, keepalive: Duration, buffer: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                bus,
                connections: Mutex::new(HashMap::new()),
                keepalive,
                buffer: buffer.max(1),
            }),
        }
    }

    /// Register a connection for `staff` and subscribe it to the bus.
    #[must_use]
    pub fn open(&self, staff: &CurrentStaff) -> LiveConnection {
        let info = ConnectionInfo {
            id: Uuid::new_v4(),
            staff_id: staff.id,
            staff_name: staff.name.clone(),
            opened_at: Utc::now(),
        };

        let subscription = self.inner.bus.subscribe(
            SubscriberConfig::new(format!("live:{}", info.id))
                .capacity(self.inner.buffer)
                .on_overflow(Overflow::Disconnect),
        );

        let open = {
            let mut connections = self.inner.connections();
            connections.insert(info.id, info.clone());
            connections.len()
        };

        tracing::info!(
            connection_id = %info.id,
            staff_id = %info.staff_id,
            staff = %info.staff_name,
            open,
            "live connection opened"
        );

        LiveConnection {
            info,
            subscription,
            keepalive: self.inner.keepalive,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections().len()
    }
}

/// An open live connection. Deregisters itself when dropped.
pub struct LiveConnection {
    info: ConnectionInfo,
    subscription: Subscription,
    keepalive: Duration,
    registry: Weak<RegistryInner>,
}

impl LiveConnection {
    /// Frame stream for this connection. Dropping the stream closes the
    /// connection.
    pub fn frames(mut self) -> impl Stream<Item = StreamFrame> + Send + 'static {
        stream! {
            yield StreamFrame::Connected;

            let mut heartbeat = tokio::time::interval_at(Instant::now() + self.keepalive, self.keepalive);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let next = tokio::select! {
                    event = self.subscription.recv() => event.map(StreamFrame::Event),
                    _ = heartbeat.tick() => Some(StreamFrame::Keepalive),
                };

                match next {
                    Some(frame) => yield frame,
                    None => {
                        tracing::info!(connection_id = %self.info.id, "live connection dropped by bus");
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let open = {
            let mut connections = registry.connections();
            connections.remove(&self.info.id);
            connections.len()
        };
        let open_secs = (Utc::now() - self.info.opened_at).num_seconds();
        tracing::info!(
            connection_id = %self.info.id,
            open,
            open_secs,
            "live connection closed"
        );
    }
}
