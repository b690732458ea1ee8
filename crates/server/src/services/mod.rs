//! Business logic services for the order desk.
//!
//! # Services
//!
//! - `lifecycle` - Order state machine, edits and audit history
//! - `order_locks` - Per-order serialization of mutations
//! - `live_stream` - Live operator connections over the event bus
//! - `push` - FCM and Web Push fan-out with destination pruning

pub mod lifecycle;
pub mod live_stream;
pub mod order_locks;
pub mod push;

pub use lifecycle::{
    CheckoutItem, CheckoutRequest, CustomerPatch, ItemEdit, LifecycleError, OrderLifecycle,
};
pub use live_stream::{LiveConnection, StreamFrame, StreamRegistry, to_sse};
pub use order_locks::{OrderGuard, OrderLocks};
pub use push::{
    DeliveryOutcome, DispatchReport, PushChannel, PushDispatcher, PushError, PushPayload,
    spawn_push_worker,
};
