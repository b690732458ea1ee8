//! Background task that feeds lifecycle events to the push dispatcher.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::PushDispatcher;
use crate::events::{EventBus, Overflow, SubscriberConfig};

/// Queue depth between the bus and the dispatcher.
pub const WORKER_CAPACITY: usize = 256;

/// Subscribe to the bus and dispatch every event in order.
///
/// The subscription is taken before this returns, so events published after
/// the call are never missed. If the dispatcher falls behind by more than
/// [`WORKER_CAPACITY`] events, the overflowing events are dropped with a
/// warning; the next event carries the fresh state.
pub fn spawn_push_worker(bus: &EventBus, dispatcher: Arc<PushDispatcher>) -> JoinHandle<()> {
    let mut subscription = bus.subscribe(
        SubscriberConfig::new("push-worker")
            .capacity(WORKER_CAPACITY)
            .on_overflow(Overflow::DropEvent),
    );

    tokio::spawn(async move {
        tracing::info!("push worker started");
        while let Some(event) = subscription.recv().await {
            if let Err(e) = dispatcher.dispatch(&event).await {
                tracing::error!(
                    order_id = %event.order.order.id,
                    topic = %event.topic,
                    error = %e,
                    "push dispatch failed"
                );
            }
        }
        tracing::info!("push worker stopped");
    })
}
