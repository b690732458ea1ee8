//! Catalog lookups for checkout.

use sqlx::PgPool;

use orderdesk_core::{CatalogItemId, Money};

use super::RepositoryError;
use crate::models::CatalogItem;

#[derive(Debug, sqlx::FromRow)]
struct CatalogItemRow {
    id: i64,
    name: String,
    price: Money,
    is_available: bool,
}

impl From<CatalogItemRow> for CatalogItem {
    fn from(row: CatalogItemRow) -> Self {
        Self {
            id: CatalogItemId::new(row.id),
            name: row.name,
            price: row.price,
            is_available: row.is_available,
        }
    }
}

/// Repository for catalog reads (and seeding).
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the given catalog entries. Unknown ids are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_items(
        &self,
        ids: &[CatalogItemId],
    ) -> Result<Vec<CatalogItem>, RepositoryError> {
        let ids: Vec<i64> = ids.iter().map(CatalogItemId::as_i64).collect();

        let rows = sqlx::query_as::<_, CatalogItemRow>(
            "SELECT id, name, price, is_available FROM catalog_item WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogItem::from).collect())
    }

    /// Insert a catalog entry, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(
        &self,
        name: &str,
        price: Money,
        is_available: bool,
    ) -> Result<CatalogItemId, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO catalog_item (name, price, is_available) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(price)
        .bind(is_available)
        .fetch_one(self.pool)
        .await?;

        Ok(CatalogItemId::new(id))
    }

    /// Number of catalog entries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM catalog_item")
            .fetch_one(self.pool)
            .await?)
    }
}
