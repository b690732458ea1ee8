//! Order desk back office library.
//!
//! Order lifecycle, live operator stream and push fan-out, exposed as a
//! library so the binary, the CLI and the integration tests share one
//! implementation.
//!
//! # Flow
//!
//! A mutation goes through [`services::OrderLifecycle`], commits to the
//! record store, and is published on the [`events::EventBus`]. Live
//! connections ([`services::StreamRegistry`]) and the push worker
//! ([`services::spawn_push_worker`]) are independent bus subscribers.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
