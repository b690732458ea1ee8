//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (`http_request` span)
//! 3. Session layer (tower-sessions)
//! 4. [`RequireStaff`] extractor on staff routes

pub mod auth;
pub mod session;

pub use auth::{RequireStaff, StaffAuthRejection, set_current_staff};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, create_session_store};
