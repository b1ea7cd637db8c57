//! Order repository.
//!
//! Checkout runs in one transaction: the ordered products are locked with
//! `FOR UPDATE` (in id order, so concurrent checkouts cannot deadlock), stock
//! is checked and decremented, and the order is written with the prices read
//! under the lock. Any error drops the transaction, which rolls it back.

use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use pasal_core::{
    Money, OrderId, OrderStatus, PaymentProvider, PaymentStatus, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderLine, OrderWithItems, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_provider, payment_status, \
     payment_reference, total_amount, shipping_address, created_at, updated_at";

/// Largest quantity of a single product accepted in one order.
pub const MAX_LINE_QUANTITY: u32 = 1000;

/// Reasons checkout can be refused.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("order has no items")]
    Empty,

    /// A line asked for zero (or an absurd number of) units.
    #[error("quantity for product {0} must be between 1 and 1000")]
    InvalidQuantity(ProductId),

    /// Product missing or soft-deleted.
    #[error("product {0} is not available")]
    Unavailable(ProductId),

    /// Not enough stock to fill a line.
    #[error("only {available} left of {name}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i32,
    },

    /// Database failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// A product row read under lock at checkout.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: i32,
    pub is_active: bool,
}

/// A checkout line priced against the locked product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

/// Sum quantities per product, rejecting empty orders and bad quantities.
///
/// # Errors
///
/// Returns `CheckoutError::Empty` or `CheckoutError::InvalidQuantity`.
pub fn merge_lines(lines: &[OrderLine]) -> Result<BTreeMap<ProductId, u32>, CheckoutError> {
    let mut merged = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }
        let total = merged.entry(line.product_id).or_insert(0_u32);
        *total = total.saturating_add(line.quantity);
        if *total > MAX_LINE_QUANTITY {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }
    }
    if merged.is_empty() {
        return Err(CheckoutError::Empty);
    }
    Ok(merged)
}

/// Check every wanted product against the locked rows and price the order.
///
/// # Errors
///
/// Returns `CheckoutError::Unavailable` for missing or inactive products and
/// `CheckoutError::InsufficientStock` when a line exceeds stock.
pub fn price_lines(
    wanted: &BTreeMap<ProductId, u32>,
    rows: &[StockRow],
) -> Result<(Vec<PricedLine>, Money), CheckoutError> {
    let mut lines = Vec::with_capacity(wanted.len());
    let mut total = Money::ZERO;

    for (&product_id, &quantity) in wanted {
        let row = rows
            .iter()
            .find(|r| r.id == product_id && r.is_active)
            .ok_or(CheckoutError::Unavailable(product_id))?;

        let requested =
            i32::try_from(quantity).map_err(|_| CheckoutError::InvalidQuantity(product_id))?;
        if row.stock < requested {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                name: row.name.clone(),
                available: row.stock.max(0),
            });
        }

        total = total + row.price * quantity;
        lines.push(PricedLine {
            product_id,
            name: row.name.clone(),
            unit_price: row.price,
            quantity: requested,
        });
    }

    Ok((lines, total))
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// When `clear_cart` is set, the purchased products are removed from the
    /// user's cart in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns a `CheckoutError` describing why the order was refused; nothing
    /// is written in that case.
    pub async fn create(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        shipping: &ShippingAddress,
        provider: PaymentProvider,
        clear_cart: bool,
    ) -> Result<OrderWithItems, CheckoutError> {
        let wanted = merge_lines(lines)?;
        let ids: Vec<i32> = wanted.keys().map(ProductId::as_i32).collect();

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, StockRow>(
            "SELECT id, name, price, stock, is_active FROM products \
             WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let (priced, total) = price_lines(&wanted, &rows)?;

        let order_id: OrderId = sqlx::query_scalar(
            "INSERT INTO orders (user_id, payment_provider, total_amount, shipping_address) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(provider)
        .bind(total)
        .bind(Json(shipping))
        .fetch_one(&mut *tx)
        .await?;

        for line in &priced {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        if clear_cart {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2)")
                .bind(user_id)
                .bind(&ids)
                .execute(&mut *tx)
                .await?;
        }

        let order = fetch_order(&mut tx, order_id).await?;
        let items = fetch_items(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            lines = items.len(),
            "Order placed"
        );

        Ok(OrderWithItems { order, items })
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderWithItems>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let Some(order) = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = fetch_items(self.pool, id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    /// Get an order header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn get_header(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(orders)
    }

    /// All orders, optionally filtered by status, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::order_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok((orders, total))
    }

    /// Cancel a pending, unpaid order on behalf of its owner and put the stock back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such order.
    /// Returns `RepositoryError::Conflict` if the order is past pending or paid.
    pub async fn cancel(&self, user_id: UserId, id: OrderId) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, id).await?;
        if order.user_id != user_id {
            return Err(RepositoryError::NotFound);
        }
        if order.status != OrderStatus::Pending || order.payment_status == PaymentStatus::Paid {
            return Err(RepositoryError::Conflict(
                "only pending, unpaid orders can be cancelled".to_string(),
            ));
        }

        let order = set_status(&mut tx, id, OrderStatus::Cancelled).await?;
        restore_stock(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %id, "Order cancelled by customer");
        Ok(order)
    }

    /// Move an order to `next`, enforcing the status transition rules.
    /// Cancelling restores stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, id).await?;
        if !current.status.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "cannot move order from {} to {next}",
                current.status
            )));
        }

        let order = set_status(&mut tx, id, next).await?;
        if next == OrderStatus::Cancelled {
            restore_stock(&mut tx, id).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %id, from = %current.status, to = %next, "Order status changed");
        Ok(order)
    }

    /// Record which provider is collecting payment and its reference
    /// (Stripe session id, eSewa transaction uuid, Khalti pidx).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn set_payment_reference(
        &self,
        id: OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_provider = $2, payment_reference = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(provider)
        .bind(reference)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find the order a provider reference was issued for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_payment_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE payment_provider = $1 AND payment_reference = $2"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(provider)
            .bind(reference)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Mark an order paid. A pending order also moves to processing.
    ///
    /// The cancelled check is part of the update, so a cancel that commits
    /// first cannot be overwritten.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the order was cancelled.
    pub async fn mark_paid(&self, id: OrderId, reference: &str) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE orders SET payment_status = 'paid', payment_reference = $2, \
               status = CASE WHEN status = 'pending' THEN 'processing'::order_status ELSE status END, \
               updated_at = NOW() \
             WHERE id = $1 AND status <> 'cancelled' RETURNING {ORDER_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(reference)
            .fetch_optional(self.pool)
            .await?;

        let Some(order) = updated else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                    .bind(id)
                    .fetch_one(self.pool)
                    .await?;
            return Err(if exists {
                RepositoryError::Conflict("order was cancelled".to_string())
            } else {
                RepositoryError::NotFound
            });
        };

        tracing::info!(order_id = %id, provider = %order.payment_provider, "Order marked paid");
        Ok(order)
    }

    /// Mark an unpaid order's payment as failed. Paid orders are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_failed(&self, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET payment_status = 'failed', updated_at = NOW() \
             WHERE id = $1 AND payment_status <> 'paid'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        tracing::warn!(order_id = %id, "Order payment failed");
        Ok(())
    }
}

async fn fetch_order(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<Order, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(order)
}

async fn fetch_items<'e, E>(executor: E, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, product_name, unit_price, quantity \
         FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<Order, RepositoryError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    let sql = format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    );
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .bind(status)
        .fetch_one(&mut **tx)
        .await?;
    Ok(order)
}

async fn restore_stock(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW() \
         FROM order_items oi WHERE oi.order_id = $1 AND p.id = oi.product_id",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(product: i32, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn row(id: i32, price_cents: i64, stock: i32) -> StockRow {
        StockRow {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::new(Decimal::new(price_cents, 2)).unwrap(),
            stock,
            is_active: true,
        }
    }

    #[test]
    fn test_merge_lines_sums_duplicates() {
        let merged = merge_lines(&[line(2, 1), line(1, 2), line(2, 3)]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[&ProductId::new(2)], 4);
        assert_eq!(merged.keys().next(), Some(&ProductId::new(1)));
    }

    #[test]
    fn test_merge_lines_rejects_empty_and_zero() {
        assert!(matches!(merge_lines(&[]), Err(CheckoutError::Empty)));
        assert!(matches!(
            merge_lines(&[line(1, 0)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
        assert!(matches!(
            merge_lines(&[line(1, MAX_LINE_QUANTITY), line(1, 1)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_price_lines_totals() {
        let wanted = merge_lines(&[line(1, 2), line(2, 1)]).unwrap();
        let (lines, total) = price_lines(&wanted, &[row(1, 1500, 5), row(2, 250, 1)]).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(total.to_string(), "32.50");
    }

    #[test]
    fn test_price_lines_insufficient_stock() {
        let wanted = merge_lines(&[line(1, 3)]).unwrap();
        let err = price_lines(&wanted, &[row(1, 1000, 2)]).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { available: 2, .. }
        ));
        assert_eq!(err.to_string(), "only 2 left of Product 1");
    }

    #[test]
    fn test_price_lines_unavailable() {
        let wanted = merge_lines(&[line(1, 1), line(9, 1)]).unwrap();
        let err = price_lines(&wanted, &[row(1, 1000, 2)]).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable(id) if id == ProductId::new(9)));

        let mut inactive = row(1, 1000, 2);
        inactive.is_active = false;
        let wanted = merge_lines(&[line(1, 1)]).unwrap();
        assert!(matches!(
            price_lines(&wanted, &[inactive]),
            Err(CheckoutError::Unavailable(_))
        ));
    }
}
