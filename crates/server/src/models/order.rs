//! Order, order item and catalog types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{
    CatalogItemId, DeliveryType, Email, Money, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    Phone,
};

use super::history::{HistoryEntry, NewHistoryEntry};

/// Customer contact fields on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    pub address: Option<String>,
    pub comment: Option<String>,
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub customer: CustomerDetails,
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    /// Always equal to the sum of the item line totals.
    pub total: Money,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order.
///
/// `name` and `price` are copied from the catalog at checkout and never
/// re-read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub catalog_item_id: CatalogItemId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
}

impl OrderItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        Money::line_total(self.price, self.quantity)
    }
}

/// Order with its items and full history, as published and as returned by
/// the snapshot queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<HistoryEntry>,
}

impl OrderSnapshot {
    /// Sum of line totals over items with a positive quantity.
    #[must_use]
    pub fn items_total(&self) -> Money {
        items_total(&self.items)
    }

    /// Find an item by id.
    #[must_use]
    pub fn item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Sum of line totals over items with a positive quantity.
pub fn items_total<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> Money {
    items
        .into_iter()
        .filter(|item| item.quantity > 0)
        .map(OrderItem::line_total)
        .sum()
}

// =============================================================================
// Write Models
// =============================================================================

/// A validated order ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: CustomerDetails,
    pub delivery_type: DeliveryType,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Total derived from the item snapshots.
    #[must_use]
    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|item| Money::line_total(item.price, item.quantity))
            .sum()
    }
}

/// An item line for a new order, already priced from the catalog.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub catalog_item_id: CatalogItemId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
}

/// Change to a single item row applied as part of an [`OrderCommit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemMutation {
    /// Overwrite the quantity.
    SetQuantity { id: OrderItemId, quantity: i32 },
    /// Delete the row.
    Remove { id: OrderItemId },
}

/// Everything one mutation writes, committed atomically by the store.
///
/// The store rejects the commit with a conflict when the order's
/// `updated_at` no longer equals `expected_updated_at`.
#[derive(Debug, Clone)]
pub struct OrderCommit {
    pub order_id: OrderId,
    pub expected_updated_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub customer: CustomerDetails,
    pub total: Money,
    pub item_mutations: Vec<ItemMutation>,
    pub history: NewHistoryEntry,
}

/// Filter for the order list query.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Only orders created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl OrderFilter {
    /// Upper bound on `limit`.
    pub const MAX_LIMIT: i64 = 500;

    /// The effective limit, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::MAX_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    /// Whether an order passes the filter (used by the in-memory store).
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|status| order.status == status)
            && self.since.is_none_or(|since| order.created_at >= since)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog entry as seen by checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub price: Money,
    pub is_available: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i64, price_minor: i64, quantity: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(1),
            catalog_item_id: CatalogItemId::new(id),
            name: format!("item {id}"),
            price: Money::from_minor(price_minor),
            quantity,
        }
    }

    #[test]
    fn test_items_total_skips_removed_lines() {
        let items = [item(1, 5000, 2), item(2, 3000, 1), item(3, 9900, 0)];
        assert_eq!(items_total(&items), Money::from_minor(13_000));
    }

    #[test]
    fn test_filter_limit_is_clamped() {
        let filter = OrderFilter {
            limit: Some(10_000),
            ..OrderFilter::default()
        };
        assert_eq!(filter.effective_limit(), OrderFilter::MAX_LIMIT);

        let filter = OrderFilter {
            limit: Some(0),
            ..OrderFilter::default()
        };
        assert_eq!(filter.effective_limit(), 1);
    }
}
