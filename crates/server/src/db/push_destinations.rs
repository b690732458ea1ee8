//! Database operations for push destinations.

use sqlx::PgPool;

use orderdesk_core::{Locale, StaffId};

use super::RepositoryError;
use crate::models::{
    DestinationKind, PushDestination, SubscriptionDestination, TokenDestination,
};

#[derive(Debug, sqlx::FromRow)]
struct PushDestinationRow {
    identity: String,
    kind: DestinationKind,
    locale: String,
    p256dh: Option<String>,
    auth: Option<String>,
}

impl TryFrom<PushDestinationRow> for PushDestination {
    type Error = RepositoryError;

    fn try_from(row: PushDestinationRow) -> Result<Self, Self::Error> {
        let locale = Locale::parse(&row.locale).map_err(|e| {
            RepositoryError::DataCorruption(format!("push destination locale: {e}"))
        })?;

        match row.kind {
            DestinationKind::Token => Ok(Self::Token(TokenDestination {
                token: row.identity,
                locale,
            })),
            DestinationKind::Subscription => match (row.p256dh, row.auth) {
                (Some(p256dh), Some(auth)) => Ok(Self::Subscription(SubscriptionDestination {
                    endpoint: row.identity,
                    p256dh,
                    auth,
                    locale,
                })),
                _ => Err(RepositoryError::DataCorruption(
                    "subscription destination without keys".to_string(),
                )),
            },
        }
    }
}

/// Repository for push destination rows.
pub struct PushDestinationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PushDestinationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert, or replace the row with the same identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        destination: &PushDestination,
        registered_by: Option<StaffId>,
    ) -> Result<(), RepositoryError> {
        let (p256dh, auth) = match destination {
            PushDestination::Token(_) => (None, None),
            PushDestination::Subscription(d) => (Some(d.p256dh.as_str()), Some(d.auth.as_str())),
        };

        sqlx::query(
            "INSERT INTO push_destination (identity, kind, locale, p256dh, auth, staff_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (identity) DO UPDATE SET \
               kind = EXCLUDED.kind, locale = EXCLUDED.locale, p256dh = EXCLUDED.p256dh, \
               auth = EXCLUDED.auth, staff_id = EXCLUDED.staff_id, updated_at = now()",
        )
        .bind(destination.identity())
        .bind(destination.kind())
        .bind(destination.locale().as_str())
        .bind(p256dh)
        .bind(auth)
        .bind(registered_by)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete by identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(&self, identity: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM push_destination WHERE identity = $1")
            .bind(identity)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All destinations in registration order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a row cannot be decoded.
    pub async fn list(&self) -> Result<Vec<PushDestination>, RepositoryError> {
        sqlx::query_as::<_, PushDestinationRow>(
            "SELECT identity, kind, locale, p256dh, auth FROM push_destination ORDER BY created_at",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(PushDestination::try_from)
        .collect()
    }
}
