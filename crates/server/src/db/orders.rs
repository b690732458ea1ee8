//! Database operations for orders, order items and order history.
//!
//! Queries are checked at runtime (`query_as::<_, Row>`), so building the
//! crate does not require a live database.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use orderdesk_core::{
    CatalogItemId, DeliveryType, Email, HistoryEntryId, Money, OrderId, OrderItemId, OrderStatus,
    PaymentMethod, Phone, StaffId,
};

use super::RepositoryError;
use crate::models::{
    Actor, CustomerDetails, HistoryAction, HistoryDetails, HistoryEntry, ItemMutation, NewOrder,
    Order, OrderCommit, OrderFilter, OrderItem, OrderSnapshot,
};

const ORDER_COLUMNS: &str = "id, status, customer_name, customer_phone, customer_email, \
     delivery_address, comment, delivery_type, payment_method, total, cancel_reason, \
     created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, catalog_item_id, name, price, quantity";

const HISTORY_COLUMNS: &str = "id, order_id, action, details, actor_id, actor_name, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    status: OrderStatus,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    delivery_address: Option<String>,
    comment: Option<String>,
    delivery_type: DeliveryType,
    payment_method: PaymentMethod,
    total: Money,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let phone = Phone::parse(&row.customer_phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("order {} phone: {e}", row.id))
        })?;
        let email = row
            .customer_email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("order {} email: {e}", row.id)))?;

        Ok(Self {
            id: OrderId::new(row.id),
            status: row.status,
            customer: CustomerDetails {
                name: row.customer_name,
                phone,
                email,
                address: row.delivery_address,
                comment: row.comment,
            },
            delivery_type: row.delivery_type,
            payment_method: row.payment_method,
            total: row.total,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    catalog_item_id: i64,
    name: String,
    price: Money,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            catalog_item_id: CatalogItemId::new(row.catalog_item_id),
            name: row.name,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    order_id: i64,
    action: HistoryAction,
    details: serde_json::Value,
    actor_id: i64,
    actor_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let details: HistoryDetails = serde_json::from_value(row.details).map_err(|e| {
            RepositoryError::DataCorruption(format!("history {} details: {e}", row.id))
        })?;

        if details.action() != row.action {
            return Err(RepositoryError::DataCorruption(format!(
                "history {} action column {:?} disagrees with details {:?}",
                row.id,
                row.action,
                details.action()
            )));
        }

        Ok(Self {
            id: HistoryEntryId::new(row.id),
            order_id: OrderId::new(row.order_id),
            details,
            actor: Actor {
                id: StaffId::new(row.actor_id),
                name: row.actor_name,
            },
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(&self, new: NewOrder) -> Result<OrderSnapshot, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let total = new.total();

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (customer_name, customer_phone, customer_email, delivery_address, \
             comment, delivery_type, payment_method, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&new.customer.name)
        .bind(new.customer.phone.as_str())
        .bind(new.customer.email.as_ref().map(Email::as_str))
        .bind(new.customer.address.as_deref())
        .bind(new.customer.comment.as_deref())
        .bind(new.delivery_type)
        .bind(new.payment_method)
        .bind(total)
        .fetch_one(&mut *tx)
        .await?;

        let order = Order::try_from(row)?;
        let mut items = Vec::with_capacity(new.items.len());

        for item in &new.items {
            let row = sqlx::query_as::<_, OrderItemRow>(&format!(
                "INSERT INTO order_item (order_id, catalog_item_id, name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING {ITEM_COLUMNS}"
            ))
            .bind(order.id)
            .bind(item.catalog_item_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(row));
        }

        tx.commit().await?;

        Ok(OrderSnapshot {
            order,
            items,
            history: Vec::new(),
        })
    }

    /// Load an order with items and history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn snapshot(&self, id: OrderId) -> Result<Option<OrderSnapshot>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_snapshot(&mut conn, id).await
    }

    /// List orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderSnapshot>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::order_status IS NULL OR status = $1) \
               AND ($2::timestamptz IS NULL OR created_at >= $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(filter.status)
        .bind(filter.since)
        .bind(filter.effective_limit())
        .fetch_all(self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();

        let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let history_rows = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM order_history WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let item = OrderItem::from(row);
            items.entry(item.order_id).or_default().push(item);
        }

        let mut history: HashMap<OrderId, Vec<HistoryEntry>> = HashMap::new();
        for row in history_rows {
            let entry = HistoryEntry::try_from(row)?;
            history.entry(entry.order_id).or_default().push(entry);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderSnapshot {
                items: items.remove(&order.id).unwrap_or_default(),
                history: history.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    /// Apply a mutation in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order or a mutated item is
    /// missing, `RepositoryError::Conflict` if the order was modified since it
    /// was read, or `RepositoryError::Database` if a query fails.
    pub async fn commit(&self, commit: OrderCommit) -> Result<OrderSnapshot, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let customer = &commit.customer;

        let updated = sqlx::query(
            "UPDATE orders SET status = $2, cancel_reason = $3, customer_name = $4, \
             customer_phone = $5, customer_email = $6, delivery_address = $7, comment = $8, \
             total = $9, updated_at = GREATEST(now(), updated_at + interval '1 microsecond') \
             WHERE id = $1 AND updated_at = $10",
        )
        .bind(commit.order_id)
        .bind(commit.status)
        .bind(commit.cancel_reason.as_deref())
        .bind(&customer.name)
        .bind(customer.phone.as_str())
        .bind(customer.email.as_ref().map(Email::as_str))
        .bind(customer.address.as_deref())
        .bind(customer.comment.as_deref())
        .bind(commit.total)
        .bind(commit.expected_updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(commit.order_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                RepositoryError::Conflict(format!(
                    "order {} was modified concurrently",
                    commit.order_id
                ))
            } else {
                RepositoryError::NotFound
            });
        }

        for mutation in &commit.item_mutations {
            let result = match *mutation {
                ItemMutation::SetQuantity { id, quantity } => {
                    sqlx::query("UPDATE order_item SET quantity = $3 WHERE id = $1 AND order_id = $2")
                        .bind(id)
                        .bind(commit.order_id)
                        .bind(quantity)
                        .execute(&mut *tx)
                        .await?
                }
                ItemMutation::Remove { id } => {
                    sqlx::query("DELETE FROM order_item WHERE id = $1 AND order_id = $2")
                        .bind(id)
                        .bind(commit.order_id)
                        .execute(&mut *tx)
                        .await?
                }
            };
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        let details = serde_json::to_value(&commit.history.details)
            .map_err(|e| RepositoryError::DataCorruption(format!("history details: {e}")))?;

        sqlx::query(
            "INSERT INTO order_history (order_id, action, details, actor_id, actor_name) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(commit.order_id)
        .bind(commit.history.details.action())
        .bind(details)
        .bind(commit.history.actor.id)
        .bind(&commit.history.actor.name)
        .execute(&mut *tx)
        .await?;

        let snapshot = load_snapshot(&mut tx, commit.order_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(snapshot)
    }
}

/// Load one snapshot over an existing connection or transaction.
async fn load_snapshot(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<OrderSnapshot>, RepositoryError> {
    let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OrderItem::from)
    .collect();

    let history = sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM order_history WHERE order_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(HistoryEntry::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(OrderSnapshot {
        order: Order::try_from(row)?,
        items,
        history,
    }))
}
