//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::OrderdeskConfig;
use crate::db::DestinationStore;
use crate::services::{OrderLifecycle, StreamRegistry};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: OrderdeskConfig,
    lifecycle: OrderLifecycle,
    streams: StreamRegistry,
    destinations: Arc<dyn DestinationStore>,
    pool: Option<PgPool>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: OrderdeskConfig,
        lifecycle: OrderLifecycle,
        streams: StreamRegistry,
        destinations: Arc<dyn DestinationStore>,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                lifecycle,
                streams,
                destinations,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OrderdeskConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn lifecycle(&self) -> &OrderLifecycle {
        &self.inner.lifecycle
    }

    #[must_use]
    pub fn streams(&self) -> &StreamRegistry {
        &self.inner.streams
    }

    #[must_use]
    pub fn destinations(&self) -> &dyn DestinationStore {
        self.inner.destinations.as_ref()
    }

    /// Database pool, absent when running on the in-memory store.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// VAPID public key, when Web Push is enabled.
    #[must_use]
    pub fn vapid_public_key(&self) -> Option<&str> {
        self.inner
            .config
            .push
            .web_push
            .as_ref()
            .map(|w| w.public_key.as_str())
    }
}
