//! Order record store.
//!
//! # Tables
//!
//! - `catalog_item` - Checkout price/availability lookup
//! - `orders` - Order rows (status, customer fields, total)
//! - `order_item` - Item lines with name/price snapshots
//! - `order_history` - Append-only audit entries (JSONB details)
//! - `push_destination` - Registered FCM tokens and Web Push subscriptions
//! - `tower_sessions.session` - Staff sessions
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p orderdesk-cli -- migrate
//! ```
//!
//! # Store seams
//!
//! Handlers and services only see the [`OrderStore`], [`Catalog`] and
//! [`DestinationStore`] traits. [`PgStore`] implements them over `PostgreSQL`;
//! [`MemoryStore`] implements them in process for tests and database-less
//! development runs.

pub mod catalog;
pub mod memory;
pub mod orders;
pub mod push_destinations;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use orderdesk_core::{CatalogItemId, OrderId, StaffId};

use crate::models::{
    CatalogItem, NewOrder, OrderCommit, OrderFilter, OrderSnapshot, PushDestination,
};

pub use catalog::CatalogRepository;
pub use memory::MemoryStore;
pub use orders::OrderRepository;
pub use push_destinations::PushDestinationRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Concurrent modification or constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Persistent orders, items and history.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order and its items in one transaction.
    async fn insert(&self, order: NewOrder) -> Result<OrderSnapshot, RepositoryError>;

    /// Load an order with items and history.
    async fn snapshot(&self, id: OrderId) -> Result<Option<OrderSnapshot>, RepositoryError>;

    /// List orders (newest first) with items and history.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSnapshot>, RepositoryError>;

    /// Apply a mutation atomically: order row, item rows and one history
    /// append, or nothing.
    ///
    /// # Errors
    ///
    /// `NotFound` if the order (or a mutated item) does not exist, `Conflict`
    /// if the order changed since `expected_updated_at`.
    async fn commit(&self, commit: OrderCommit) -> Result<OrderSnapshot, RepositoryError>;
}

/// Catalog price/availability lookup used at checkout.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Return the catalog entries for the given ids. Unknown ids are omitted.
    async fn find_items(&self, ids: &[CatalogItemId]) -> Result<Vec<CatalogItem>, RepositoryError>;
}

/// Registered push destinations.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Insert or replace the destination with the same identity.
    async fn upsert(
        &self,
        destination: &PushDestination,
        registered_by: Option<StaffId>,
    ) -> Result<(), RepositoryError>;

    /// Delete by identity. Returns whether a row was removed.
    async fn remove(&self, identity: &str) -> Result<bool, RepositoryError>;

    /// All current destinations.
    async fn list(&self) -> Result<Vec<PushDestination>, RepositoryError>;
}

/// `PostgreSQL`-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderSnapshot, RepositoryError> {
        OrderRepository::new(&self.pool).insert(order).await
    }

    async fn snapshot(&self, id: OrderId) -> Result<Option<OrderSnapshot>, RepositoryError> {
        OrderRepository::new(&self.pool).snapshot(id).await
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSnapshot>, RepositoryError> {
        OrderRepository::new(&self.pool).list(filter).await
    }

    async fn commit(&self, commit: OrderCommit) -> Result<OrderSnapshot, RepositoryError> {
        OrderRepository::new(&self.pool).commit(commit).await
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn find_items(&self, ids: &[CatalogItemId]) -> Result<Vec<CatalogItem>, RepositoryError> {
        CatalogRepository::new(&self.pool).find_items(ids).await
    }
}

#[async_trait]
impl DestinationStore for PgStore {
    async fn upsert(
        &self,
        destination: &PushDestination,
        registered_by: Option<StaffId>,
    ) -> Result<(), RepositoryError> {
        PushDestinationRepository::new(&self.pool)
            .upsert(destination, registered_by)
            .await
    }

    async fn remove(&self, identity: &str) -> Result<bool, RepositoryError> {
        PushDestinationRepository::new(&self.pool).remove(identity).await
    }

    async fn list(&self) -> Result<Vec<PushDestination>, RepositoryError> {
        PushDestinationRepository::new(&self.pool).list().await
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
