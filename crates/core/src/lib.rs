//! Orderdesk Core - Shared domain vocabulary.
//!
//! This crate provides the types shared by every Orderdesk component:
//! - `server` - Order lifecycle, live stream and push dispatch
//! - `cli` - Migrations, catalog seeding and the terminal stream client
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The optional `postgres` feature adds `sqlx`
//! encode/decode impls so the server can bind these types directly.
//!
//! # Modules
//!
//! - [`types`] - Ids, money, statuses, locales and customer field validation
//! - [`reconnect`] - Client-side reconnection policy for the live stream

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod reconnect;
pub mod types;

pub use reconnect::{ReconnectAction, ReconnectPolicy};
pub use types::*;
