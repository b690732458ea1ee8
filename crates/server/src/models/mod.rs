//! Domain models for the order desk.

pub mod history;
pub mod order;
pub mod push;
pub mod session;

pub use history::{
    Actor, CustomerField, FieldChange, HistoryAction, HistoryDetails, HistoryEntry, ItemChange,
    NewHistoryEntry,
};
pub use order::{
    CatalogItem, CustomerDetails, ItemMutation, NewOrder, NewOrderItem, Order, OrderCommit,
    OrderFilter, OrderItem, OrderSnapshot, items_total,
};
pub use push::{DestinationKind, PushDestination, SubscriptionDestination, TokenDestination};
pub use session::{CurrentStaff, keys as session_keys};
