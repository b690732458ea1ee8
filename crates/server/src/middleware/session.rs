//! Session middleware configuration.
//!
//! Sessions live in the `tower_sessions.session` table shared with the shop's
//! account service, which performs the login and writes the staff identity.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::OrderdeskConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "orderdesk_session";

/// Session expiry time in seconds (12 hours of inactivity, one shift).
const SESSION_EXPIRY_SECONDS: i64 = 12 * 60 * 60;

const SESSION_SCHEMA: &str = "tower_sessions";
const SESSION_TABLE: &str = "session";

/// Create the `PostgreSQL` session store.
///
/// # Errors
///
/// Returns an error if the schema or table name is rejected by the store.
pub fn create_session_store(pool: &PgPool) -> Result<PostgresStore, sqlx::Error> {
    PostgresStore::new(pool.clone())
        .with_schema_name(SESSION_SCHEMA)
        .map_err(|e| sqlx::Error::Configuration(e.into()))?
        .with_table_name(SESSION_TABLE)
        .map_err(|e| sqlx::Error::Configuration(e.into()))
}

/// Wrap `store` in a session layer configured for the back office.
#[must_use]
pub fn create_session_layer<S>(store: S, config: &OrderdeskConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
