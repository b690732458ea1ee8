//! Core types for Orderdesk.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod customer;
pub mod id;
pub mod locale;
pub mod money;
pub mod status;

pub use customer::{ContactError, Email, Phone};
pub use id::*;
pub use locale::{Locale, LocaleError};
pub use money::Money;
pub use status::*;
