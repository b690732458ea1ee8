//! Lifecycle events and the in-process event bus.

pub mod bus;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::models::OrderSnapshot;

pub use bus::{EventBus, Overflow, PublishReport, SubscriberConfig, Subscription};

/// Event topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    OrderCreated,
    OrderUpdated,
}

impl Topic {
    /// Both lifecycle topics.
    pub const ALL: [Self; 2] = [Self::OrderCreated, Self::OrderUpdated];

    /// Wire name, used as the SSE event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order-created",
            Self::OrderUpdated => "order-updated",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published lifecycle event: the topic plus the full order snapshot taken
/// right after the commit.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub topic: Topic,
    pub order: Arc<OrderSnapshot>,
}

impl OrderEvent {
    #[must_use]
    pub fn new(topic: Topic, order: OrderSnapshot) -> Self {
        Self {
            topic,
            order: Arc::new(order),
        }
    }
}
