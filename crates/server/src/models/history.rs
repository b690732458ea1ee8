//! Audit history entries.
//!
//! One entry is appended per committed mutation. Entries are never updated or
//! deleted. `details` is a tagged enum; it is serialized to JSON only at the
//! storage and wire boundaries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderdesk_core::{
    CatalogItemId, HistoryEntryId, Money, OrderId, OrderItemId, OrderStatus, StaffId,
};

/// Kind of mutation recorded by a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "history_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    StatusChange,
    ItemEdit,
    CustomerEdit,
}

/// Staff member who performed a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: StaffId,
    pub name: String,
}

/// Quantity change for one order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    pub item_id: OrderItemId,
    pub catalog_item_id: CatalogItemId,
    pub name: String,
    pub from_qty: i32,
    /// `0` when the item was removed.
    pub to_qty: i32,
}

/// Editable customer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerField {
    Name,
    Phone,
    Address,
    Comment,
}

/// Before/after values of one customer field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// What a history entry records, one variant per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HistoryDetails {
    StatusChange {
        from: OrderStatus,
        to: OrderStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    ItemEdit {
        changes: Vec<ItemChange>,
        total_before: Money,
        total_after: Money,
    },
    CustomerEdit {
        changes: BTreeMap<CustomerField, FieldChange>,
    },
}

impl HistoryDetails {
    /// The action tag for this variant.
    #[must_use]
    pub const fn action(&self) -> HistoryAction {
        match self {
            Self::StatusChange { .. } => HistoryAction::StatusChange,
            Self::ItemEdit { .. } => HistoryAction::ItemEdit,
            Self::CustomerEdit { .. } => HistoryAction::CustomerEdit,
        }
    }
}

/// A committed history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub order_id: OrderId,
    pub details: HistoryDetails,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

/// A history entry about to be appended.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub details: HistoryDetails,
    pub actor: Actor,
}
