//! In-process store used by tests and by development runs without a database.
//!
//! Mirrors the `PostgreSQL` semantics that callers rely on: identity
//! allocation, all-or-nothing commits, the optimistic `updated_at` guard and
//! identity-keyed destination upserts.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};

use orderdesk_core::{
    CatalogItemId, HistoryEntryId, Money, OrderId, OrderItemId, OrderStatus, StaffId,
};

use super::{Catalog, DestinationStore, OrderStore, RepositoryError};
use crate::models::{
    CatalogItem, HistoryEntry, ItemMutation, NewOrder, Order, OrderCommit, OrderFilter, OrderItem,
    OrderSnapshot, PushDestination,
};

#[derive(Default)]
struct Inner {
    next_order_id: i64,
    next_item_id: i64,
    next_history_id: i64,
    next_catalog_id: i64,
    orders: BTreeMap<OrderId, OrderSnapshot>,
    catalog: BTreeMap<CatalogItemId, CatalogItem>,
    destinations: Vec<PushDestination>,
}

impl Inner {
    fn allocate(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// Memory-backed [`OrderStore`], [`Catalog`] and [`DestinationStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a catalog entry.
    pub fn add_catalog_item(
        &self,
        name: impl Into<String>,
        price: Money,
        is_available: bool,
    ) -> CatalogItemId {
        let mut inner = self.lock();
        let id = CatalogItemId::new(Inner::allocate(&mut inner.next_catalog_id));
        inner.catalog.insert(
            id,
            CatalogItem {
                id,
                name: name.into(),
                price,
                is_available,
            },
        );
        id
    }

    /// Change a catalog entry's price after the fact.
    pub fn set_catalog_price(&self, id: CatalogItemId, price: Money) {
        if let Some(item) = self.lock().catalog.get_mut(&id) {
            item.price = price;
        }
    }

    /// Number of stored destinations.
    #[must_use]
    pub fn destination_count(&self) -> usize {
        self.lock().destinations.len()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, new: NewOrder) -> Result<OrderSnapshot, RepositoryError> {
        let mut inner = self.lock();
        let id = OrderId::new(Inner::allocate(&mut inner.next_order_id));
        let now = Utc::now();
        let total = new.total();

        let items = new
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(Inner::allocate(&mut inner.next_item_id)),
                order_id: id,
                catalog_item_id: item.catalog_item_id,
                name: item.name,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        let snapshot = OrderSnapshot {
            order: Order {
                id,
                status: OrderStatus::New,
                customer: new.customer,
                delivery_type: new.delivery_type,
                payment_method: new.payment_method,
                total,
                cancel_reason: None,
                created_at: now,
                updated_at: now,
            },
            items,
            history: Vec::new(),
        };

        inner.orders.insert(id, snapshot.clone());
        Ok(snapshot)
    }

    async fn snapshot(&self, id: OrderId) -> Result<Option<OrderSnapshot>, RepositoryError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSnapshot>, RepositoryError> {
        let inner = self.lock();
        let mut orders: Vec<OrderSnapshot> = inner
            .orders
            .values()
            .filter(|s| filter.matches(&s.order))
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        orders.truncate(usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX));
        Ok(orders)
    }

    async fn commit(&self, commit: OrderCommit) -> Result<OrderSnapshot, RepositoryError> {
        let mut inner = self.lock();
        let history_id = HistoryEntryId::new(inner.next_history_id + 1);

        let snapshot = inner
            .orders
            .get_mut(&commit.order_id)
            .ok_or(RepositoryError::NotFound)?;

        if snapshot.order.updated_at != commit.expected_updated_at {
            return Err(RepositoryError::Conflict(format!(
                "order {} was modified concurrently",
                commit.order_id
            )));
        }

        // Validate every mutation before touching anything.
        for mutation in &commit.item_mutations {
            let (ItemMutation::SetQuantity { id, .. } | ItemMutation::Remove { id }) = *mutation;
            if snapshot.item(id).is_none() {
                return Err(RepositoryError::NotFound);
            }
        }

        for mutation in &commit.item_mutations {
            match *mutation {
                ItemMutation::SetQuantity { id, quantity } => {
                    if let Some(item) = snapshot.items.iter_mut().find(|i| i.id == id) {
                        item.quantity = quantity;
                    }
                }
                ItemMutation::Remove { id } => snapshot.items.retain(|i| i.id != id),
            }
        }

        let now = Utc::now().max(snapshot.order.updated_at + TimeDelta::microseconds(1));
        snapshot.order.status = commit.status;
        snapshot.order.cancel_reason = commit.cancel_reason;
        snapshot.order.customer = commit.customer;
        snapshot.order.total = commit.total;
        snapshot.order.updated_at = now;
        snapshot.history.push(HistoryEntry {
            id: history_id,
            order_id: commit.order_id,
            details: commit.history.details,
            actor: commit.history.actor,
            created_at: now,
        });

        let result = snapshot.clone();
        inner.next_history_id += 1;
        Ok(result)
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn find_items(&self, ids: &[CatalogItemId]) -> Result<Vec<CatalogItem>, RepositoryError> {
        let inner = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| inner.catalog.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn upsert(
        &self,
        destination: &PushDestination,
        _registered_by: Option<StaffId>,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.lock();
        match inner
            .destinations
            .iter_mut()
            .find(|d| d.identity() == destination.identity())
        {
            Some(existing) => *existing = destination.clone(),
            None => inner.destinations.push(destination.clone()),
        }
        Ok(())
    }

    async fn remove(&self, identity: &str) -> Result<bool, RepositoryError> {
        let mut inner = self.lock();
        let before = inner.destinations.len();
        inner.destinations.retain(|d| d.identity() != identity);
        Ok(inner.destinations.len() != before)
    }

    async fn list(&self) -> Result<Vec<PushDestination>, RepositoryError> {
        Ok(self.lock().destinations.clone())
    }
}
