//! Order lifecycle: the only place that mutates order state.
//!
//! Every mutation follows the same sequence:
//!
//! 1. take the per-order lock,
//! 2. load the current snapshot and validate against it,
//! 3. commit the order row, item rows and one history entry atomically,
//! 4. publish the fresh snapshot on the event bus.
//!
//! A failure in steps 1-3 publishes nothing. A mutation that changes nothing
//! (same quantities, same field values) skips steps 3-4 and returns the
//! current snapshot.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};

use orderdesk_core::{
    CatalogItemId, DeliveryType, Email, Money, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    Phone,
};
use serde::Deserialize;

use super::order_locks::OrderLocks;
use crate::db::{Catalog, OrderStore, RepositoryError};
use crate::events::{EventBus, OrderEvent, Topic};
use crate::models::{
    Actor, CustomerDetails, CustomerField, FieldChange, HistoryDetails, ItemChange, ItemMutation,
    NewHistoryEntry, NewOrder, NewOrderItem, OrderCommit, OrderFilter, OrderSnapshot, items_total,
};

/// Quantity bounds for checkout lines. Item edits share the upper bound.
pub const MIN_CHECKOUT_QUANTITY: i64 = 1;
pub const MAX_CHECKOUT_QUANTITY: i64 = 99;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Illegal transition, invalid input or edit of a terminal order.
    #[error("{0}")]
    Validation(String),

    /// Unknown order or item.
    #[error("{0}")]
    NotFound(String),

    /// The order changed underneath this request.
    #[error("{0}")]
    Conflict(String),

    /// Storage failure.
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for LifecycleError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("order or item not found".to_string()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Order creation request from the storefront.
///
/// Client-submitted prices are not part of the request; prices come from the
/// catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(alias = "name")]
    pub customer_name: String,
    #[serde(alias = "phone")]
    pub customer_phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub delivery_type: Option<DeliveryType>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<CheckoutItem>,
}

/// One requested catalog item.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CheckoutItem {
    pub id: CatalogItemId,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl CheckoutItem {
    /// Missing or zero quantities count as one; the result is clamped to
    /// `1..=99`.
    #[must_use]
    pub fn clamped_quantity(&self) -> i32 {
        let requested = match self.quantity {
            None | Some(0) => MIN_CHECKOUT_QUANTITY,
            Some(q) => q,
        };
        let clamped = requested.clamp(MIN_CHECKOUT_QUANTITY, MAX_CHECKOUT_QUANTITY);
        i32::try_from(clamped).unwrap_or(1)
    }
}

/// New quantity for one order item. Zero or less removes the item.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ItemEdit {
    pub item_id: OrderItemId,
    pub quantity: i32,
}

/// Partial customer update. Absent or blank fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Service
// =============================================================================

/// Order lifecycle service.
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn Catalog>,
    bus: EventBus,
    locks: OrderLocks,
}

impl OrderLifecycle {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<dyn Catalog>, bus: EventBus) -> Self {
        Self {
            store,
            catalog,
            bus,
            locks: OrderLocks::new(),
        }
    }

    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Validate a checkout request against the catalog and insert the order.
    ///
    /// Unknown or unavailable catalog items are skipped. Prices and names are
    /// snapshotted from the catalog.
    ///
    /// # Errors
    ///
    /// `Validation` if required fields are missing or invalid, or if no
    /// requested item is available.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CheckoutRequest,
    ) -> Result<OrderSnapshot, LifecycleError> {
        let name = non_blank(Some(&request.customer_name))
            .ok_or_else(|| LifecycleError::Validation("customer name is required".to_string()))?
            .to_string();
        let phone = non_blank(Some(&request.customer_phone))
            .ok_or_else(|| LifecycleError::Validation("customer phone is required".to_string()))?;
        let phone = Phone::parse(phone).map_err(|e| LifecycleError::Validation(e.to_string()))?;
        let email = non_blank(request.email.as_deref())
            .map(Email::parse)
            .transpose()
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;

        if request.items.is_empty() {
            return Err(LifecycleError::Validation("cart is empty".to_string()));
        }

        let ids: Vec<CatalogItemId> = request.items.iter().map(|item| item.id).collect();
        let catalog: BTreeMap<CatalogItemId, _> = self
            .catalog
            .find_items(&ids)
            .await?
            .into_iter()
            .filter(|item| item.is_available)
            .map(|item| (item.id, item))
            .collect();

        let items: Vec<NewOrderItem> = request
            .items
            .iter()
            .filter_map(|requested| {
                catalog.get(&requested.id).map(|entry| NewOrderItem {
                    catalog_item_id: entry.id,
                    name: entry.name.clone(),
                    price: entry.price,
                    quantity: requested.clamped_quantity(),
                })
            })
            .collect();

        if items.is_empty() {
            return Err(LifecycleError::Validation(
                "none of the requested items are available".to_string(),
            ));
        }

        let skipped = request.items.len() - items.len();
        if skipped > 0 {
            debug!(skipped, "checkout skipped unavailable items");
        }

        let snapshot = self
            .store
            .insert(NewOrder {
                customer: CustomerDetails {
                    name,
                    phone,
                    email,
                    address: non_blank(request.address.as_deref()).map(str::to_string),
                    comment: non_blank(request.comment.as_deref()).map(str::to_string),
                },
                delivery_type: request.delivery_type.unwrap_or_default(),
                payment_method: request.payment_method.unwrap_or_default(),
                items,
            })
            .await?;

        info!(order_id = %snapshot.order.id, total = %snapshot.order.total, "order created");
        self.publish(Topic::OrderCreated, &snapshot);
        Ok(snapshot)
    }

    /// Move an order to `target`.
    ///
    /// `reason` is only kept for cancellations.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order, `Validation` if the transition is not
    /// in the table.
    #[instrument(skip(self, reason, actor), fields(order_id = %order_id, target = %target))]
    pub async fn change_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        reason: Option<String>,
        actor: &Actor,
    ) -> Result<OrderSnapshot, LifecycleError> {
        let _guard = self.locks.lock(order_id).await;
        let current = self.load(order_id).await?;
        let from = current.order.status;

        if !from.can_transition_to(target) {
            return Err(LifecycleError::Validation(format!(
                "cannot change status from {from} to {target}"
            )));
        }

        let reason = if target == OrderStatus::Cancelled {
            non_blank(reason.as_deref()).map(str::to_string)
        } else {
            None
        };

        let snapshot = self
            .store
            .commit(OrderCommit {
                order_id,
                expected_updated_at: current.order.updated_at,
                status: target,
                cancel_reason: reason.clone().or(current.order.cancel_reason),
                customer: current.order.customer,
                total: current.order.total,
                item_mutations: Vec::new(),
                history: NewHistoryEntry {
                    details: HistoryDetails::StatusChange {
                        from,
                        to: target,
                        reason,
                    },
                    actor: actor.clone(),
                },
            })
            .await?;

        info!(from = %from, to = %target, "order status changed");
        self.publish(Topic::OrderUpdated, &snapshot);
        Ok(snapshot)
    }

    /// Overwrite item quantities. A quantity of zero or less removes the item.
    ///
    /// When an item appears more than once, the last edit wins.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order or an item not on the order,
    /// `Validation` if the order is terminal.
    #[instrument(skip(self, edits, actor), fields(order_id = %order_id, edits = edits.len()))]
    pub async fn edit_items(
        &self,
        order_id: OrderId,
        edits: &[ItemEdit],
        actor: &Actor,
    ) -> Result<OrderSnapshot, LifecycleError> {
        let _guard = self.locks.lock(order_id).await;
        let current = self.load(order_id).await?;
        ensure_editable(&current)?;

        let mut requested: BTreeMap<OrderItemId, i32> = BTreeMap::new();
        for edit in edits {
            if current.item(edit.item_id).is_none() {
                return Err(LifecycleError::NotFound(format!(
                    "item {} is not part of order {order_id}",
                    edit.item_id
                )));
            }
            if i64::from(edit.quantity) > MAX_CHECKOUT_QUANTITY {
                return Err(LifecycleError::Validation(format!(
                    "quantity {} exceeds the maximum of {MAX_CHECKOUT_QUANTITY}",
                    edit.quantity
                )));
            }
            requested.insert(edit.item_id, edit.quantity);
        }

        let mut changes = Vec::new();
        let mut mutations = Vec::new();
        let mut removed = HashSet::new();
        let mut remaining = current.items.clone();

        for (&item_id, &quantity) in &requested {
            let Some(item) = remaining.iter_mut().find(|i| i.id == item_id) else {
                continue;
            };
            let to_qty = quantity.max(0);
            if to_qty == item.quantity {
                continue;
            }

            changes.push(ItemChange {
                item_id,
                catalog_item_id: item.catalog_item_id,
                name: item.name.clone(),
                from_qty: item.quantity,
                to_qty,
            });

            if to_qty == 0 {
                mutations.push(ItemMutation::Remove { id: item_id });
                removed.insert(item_id);
            } else {
                mutations.push(ItemMutation::SetQuantity {
                    id: item_id,
                    quantity: to_qty,
                });
                item.quantity = to_qty;
            }
        }

        if changes.is_empty() {
            debug!("item edit changed nothing");
            return Ok(current);
        }

        remaining.retain(|item| !removed.contains(&item.id));
        let total_before = current.order.total;
        let total_after: Money = items_total(&remaining);

        let snapshot = self
            .store
            .commit(OrderCommit {
                order_id,
                expected_updated_at: current.order.updated_at,
                status: current.order.status,
                cancel_reason: current.order.cancel_reason,
                customer: current.order.customer,
                total: total_after,
                item_mutations: mutations,
                history: NewHistoryEntry {
                    details: HistoryDetails::ItemEdit {
                        changes,
                        total_before,
                        total_after,
                    },
                    actor: actor.clone(),
                },
            })
            .await?;

        info!(total_before = %total_before, total_after = %total_after, "order items edited");
        self.publish(Topic::OrderUpdated, &snapshot);
        Ok(snapshot)
    }

    /// Update customer fields.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order, `Validation` if the order is terminal
    /// or the new phone number is invalid.
    #[instrument(skip(self, patch, actor), fields(order_id = %order_id))]
    pub async fn edit_customer(
        &self,
        order_id: OrderId,
        patch: &CustomerPatch,
        actor: &Actor,
    ) -> Result<OrderSnapshot, LifecycleError> {
        let _guard = self.locks.lock(order_id).await;
        let current = self.load(order_id).await?;
        ensure_editable(&current)?;

        let mut customer = current.order.customer.clone();
        let mut changes = BTreeMap::new();

        if let Some(name) = non_blank(patch.name.as_deref()).filter(|n| *n != customer.name) {
            changes.insert(
                CustomerField::Name,
                FieldChange {
                    from: Some(customer.name.clone()),
                    to: Some(name.to_string()),
                },
            );
            customer.name = name.to_string();
        }

        if let Some(phone) = non_blank(patch.phone.as_deref()) {
            let phone = Phone::parse(phone).map_err(|e| LifecycleError::Validation(e.to_string()))?;
            if phone != customer.phone {
                changes.insert(
                    CustomerField::Phone,
                    FieldChange {
                        from: Some(customer.phone.to_string()),
                        to: Some(phone.to_string()),
                    },
                );
                customer.phone = phone;
            }
        }

        for (field, value, slot) in [
            (CustomerField::Address, patch.address.as_deref(), &mut customer.address),
            (CustomerField::Comment, patch.comment.as_deref(), &mut customer.comment),
        ] {
            if let Some(value) = non_blank(value).filter(|v| slot.as_deref() != Some(*v)) {
                changes.insert(
                    field,
                    FieldChange {
                        from: slot.clone(),
                        to: Some(value.to_string()),
                    },
                );
                *slot = Some(value.to_string());
            }
        }

        if changes.is_empty() {
            debug!("customer edit changed nothing");
            return Ok(current);
        }

        let fields: Vec<CustomerField> = changes.keys().copied().collect();
        let snapshot = self
            .store
            .commit(OrderCommit {
                order_id,
                expected_updated_at: current.order.updated_at,
                status: current.order.status,
                cancel_reason: current.order.cancel_reason,
                customer,
                total: current.order.total,
                item_mutations: Vec::new(),
                history: NewHistoryEntry {
                    details: HistoryDetails::CustomerEdit { changes },
                    actor: actor.clone(),
                },
            })
            .await?;

        info!(?fields, "order customer details edited");
        self.publish(Topic::OrderUpdated, &snapshot);
        Ok(snapshot)
    }

    /// Full snapshot of one order.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order.
    pub async fn snapshot(&self, order_id: OrderId) -> Result<OrderSnapshot, LifecycleError> {
        self.load(order_id).await
    }

    /// Snapshots matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// `Repository` if the store fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSnapshot>, LifecycleError> {
        Ok(self.store.list(filter).await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<OrderSnapshot, LifecycleError> {
        self.store
            .snapshot(order_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("order {order_id} not found")))
    }

    fn publish(&self, topic: Topic, snapshot: &OrderSnapshot) {
        let report = self.bus.publish(&OrderEvent::new(topic, snapshot.clone()));
        debug!(
            topic = %topic,
            delivered = report.delivered,
            dropped = report.dropped,
            disconnected = report.disconnected,
            "event published"
        );
    }
}

fn ensure_editable(snapshot: &OrderSnapshot) -> Result<(), LifecycleError> {
    if snapshot.order.status.is_terminal() {
        return Err(LifecycleError::Validation(format!(
            "order {} is {} and can no longer be edited",
            snapshot.order.id, snapshot.order.status
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use orderdesk_core::StaffId;

    use super::*;
    use crate::db::MemoryStore;
    use crate::events::SubscriberConfig;

    struct Fixture {
        store: MemoryStore,
        lifecycle: OrderLifecycle,
        pizza: CatalogItemId,
        salad: CatalogItemId,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let pizza = store.add_catalog_item("Pizza", Money::from_minor(5000), true);
        let salad = store.add_catalog_item("Salad", Money::from_minor(3000), true);
        let lifecycle = OrderLifecycle::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            EventBus::new(),
        );
        Fixture {
            store,
            lifecycle,
            pizza,
            salad,
        }
    }

    fn actor() -> Actor {
        Actor {
            id: StaffId::new(3),
            name: "Ana".to_string(),
        }
    }

    fn checkout(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            customer_name: "Ion".to_string(),
            customer_phone: "069123456".to_string(),
            email: None,
            address: Some("str. Stefan cel Mare 1".to_string()),
            comment: None,
            delivery_type: None,
            payment_method: None,
            items,
        }
    }

    fn line(id: CatalogItemId, quantity: i64) -> CheckoutItem {
        CheckoutItem {
            id,
            quantity: Some(quantity),
        }
    }

    #[test]
    fn test_checkout_quantity_clamp() {
        let id = CatalogItemId::new(1);
        assert_eq!(CheckoutItem { id, quantity: None }.clamped_quantity(), 1);
        assert_eq!(line(id, 0).clamped_quantity(), 1);
        assert_eq!(line(id, -4).clamped_quantity(), 1);
        assert_eq!(line(id, 250).clamped_quantity(), 99);
        assert_eq!(line(id, 3).clamped_quantity(), 3);
    }

    #[tokio::test]
    async fn test_create_order_snapshots_catalog_prices() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 2), line(f.salad, 1)]))
            .await
            .unwrap();

        assert_eq!(order.order.total, Money::from_minor(13_000));
        assert_eq!(order.order.delivery_type, DeliveryType::Delivery);
        assert_eq!(order.order.payment_method, PaymentMethod::Cash);

        // Later catalog price changes do not touch the order.
        f.store.set_catalog_price(f.pizza, Money::from_minor(9900));
        let reloaded = f.lifecycle.snapshot(order.order.id).await.unwrap();
        assert_eq!(reloaded.items[0].price, Money::from_minor(5000));
    }

    #[tokio::test]
    async fn test_create_order_skips_unavailable_items() {
        let f = fixture();
        let gone = f.store.add_catalog_item("Soup", Money::from_minor(2000), false);

        let order = f
            .lifecycle
            .create_order(checkout(vec![line(gone, 1), line(f.salad, 1), line(CatalogItemId::new(404), 1)]))
            .await
            .unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.order.total, Money::from_minor(3000));

        let err = f
            .lifecycle
            .create_order(checkout(vec![line(gone, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(f.store.order_count(), 1);
    }

    #[tokio::test]
    async fn test_create_order_requires_name_and_phone() {
        let f = fixture();
        let mut request = checkout(vec![line(f.pizza, 1)]);
        request.customer_name = "   ".to_string();
        assert!(matches!(
            f.lifecycle.create_order(request).await,
            Err(LifecycleError::Validation(_))
        ));

        let mut request = checkout(vec![line(f.pizza, 1)]);
        request.customer_phone = String::new();
        assert!(matches!(
            f.lifecycle.create_order(request).await,
            Err(LifecycleError::Validation(_))
        ));

        assert!(matches!(
            f.lifecycle.create_order(checkout(Vec::new())).await,
            Err(LifecycleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_illegal_transition_publishes_nothing() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 1)]))
            .await
            .unwrap();
        let mut sub = f.lifecycle.bus().subscribe(SubscriberConfig::new("test"));

        let err = f
            .lifecycle
            .change_status(order.order.id, OrderStatus::Completed, None, &actor())
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Validation(_)));
        assert!(sub.try_recv().is_none());
        let current = f.lifecycle.snapshot(order.order.id).await.unwrap();
        assert_eq!(current.order.status, OrderStatus::New);
        assert!(current.history.is_empty());
    }

    #[tokio::test]
    async fn test_reason_is_ignored_outside_cancellation() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 1)]))
            .await
            .unwrap();

        let confirmed = f
            .lifecycle
            .change_status(
                order.order.id,
                OrderStatus::Confirmed,
                Some("whatever".to_string()),
                &actor(),
            )
            .await
            .unwrap();

        assert_eq!(confirmed.order.cancel_reason, None);
        assert_eq!(
            confirmed.history[0].details,
            HistoryDetails::StatusChange {
                from: OrderStatus::New,
                to: OrderStatus::Confirmed,
                reason: None,
            }
        );
    }

    #[tokio::test]
    async fn test_edit_unknown_item_is_not_found() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 1)]))
            .await
            .unwrap();

        let err = f
            .lifecycle
            .edit_items(
                order.order.id,
                &[ItemEdit {
                    item_id: OrderItemId::new(999),
                    quantity: 1,
                }],
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_edit_quantity_above_maximum_is_rejected() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 500)]))
            .await
            .unwrap();
        let item_id = order.items[0].id;
        assert_eq!(order.items[0].quantity, 99);

        for quantity in [100, i32::MAX] {
            let err = f
                .lifecycle
                .edit_items(order.order.id, &[ItemEdit { item_id, quantity }], &actor())
                .await
                .unwrap_err();
            assert!(matches!(err, LifecycleError::Validation(_)), "{quantity}");
        }

        let unchanged = f.lifecycle.snapshot(order.order.id).await.unwrap();
        assert_eq!(unchanged.items[0].quantity, 99);
        assert_eq!(unchanged.order.total, Money::from_minor(495_000));
        assert!(unchanged.history.is_empty());

        let at_limit = f
            .lifecycle
            .edit_items(
                order.order.id,
                &[ItemEdit {
                    item_id,
                    quantity: 99 - 1,
                }],
                &actor(),
            )
            .await
            .unwrap();
        assert_eq!(at_limit.items[0].quantity, 98);
    }

    #[tokio::test]
    async fn test_noop_item_edit_writes_nothing() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 2)]))
            .await
            .unwrap();
        let mut sub = f.lifecycle.bus().subscribe(SubscriberConfig::new("test"));

        let same = f
            .lifecycle
            .edit_items(
                order.order.id,
                &[ItemEdit {
                    item_id: order.items[0].id,
                    quantity: 2,
                }],
                &actor(),
            )
            .await
            .unwrap();

        assert!(same.history.is_empty());
        assert_eq!(same.order.updated_at, order.order.updated_at);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_customer_edit_records_only_changed_fields() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 1)]))
            .await
            .unwrap();

        let edited = f
            .lifecycle
            .edit_customer(
                order.order.id,
                &CustomerPatch {
                    name: Some("Ion".to_string()),
                    phone: Some("  ".to_string()),
                    address: None,
                    comment: Some("ring twice".to_string()),
                },
                &actor(),
            )
            .await
            .unwrap();

        assert_eq!(edited.order.customer.comment.as_deref(), Some("ring twice"));
        assert_eq!(edited.history.len(), 1);
        let HistoryDetails::CustomerEdit { changes } = &edited.history[0].details else {
            panic!("expected a customer edit");
        };
        assert_eq!(changes.keys().copied().collect::<Vec<_>>(), vec![CustomerField::Comment]);
        assert_eq!(changes[&CustomerField::Comment].from, None);
    }

    #[tokio::test]
    async fn test_customer_edit_rejects_bad_phone() {
        let f = fixture();
        let order = f
            .lifecycle
            .create_order(checkout(vec![line(f.pizza, 1)]))
            .await
            .unwrap();

        let err = f
            .lifecycle
            .edit_customer(
                order.order.id,
                &CustomerPatch {
                    phone: Some("call me".to_string()),
                    ..CustomerPatch::default()
                },
                &actor(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let f = fixture();
        let err = f
            .lifecycle
            .change_status(OrderId::new(42), OrderStatus::Confirmed, None, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }
}
