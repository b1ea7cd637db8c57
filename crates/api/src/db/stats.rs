//! Dashboard aggregates for admins.

use serde::Serialize;
use sqlx::PgPool;

use pasal_core::Money;

use super::RepositoryError;

/// Order counts by fulfillment status.
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct OrderCounts {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

/// Store-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub users: i64,
    pub products: i64,
    pub low_stock_products: i64,
    pub orders: OrderCounts,
    /// Sum of paid order totals.
    pub revenue: Money,
}

/// Products at or below this stock count are reported as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Repository for admin statistics.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn store_stats(&self) -> Result<StoreStats, RepositoryError> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(self.pool)
            .await?;

        let (products, low_stock_products): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE stock <= $1) FROM products WHERE is_active",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(self.pool)
        .await?;

        let orders = sqlx::query_as::<_, OrderCounts>(
            "SELECT COUNT(*) AS total, \
               COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
               COUNT(*) FILTER (WHERE status = 'processing') AS processing, \
               COUNT(*) FILTER (WHERE status = 'shipped') AS shipped, \
               COUNT(*) FILTER (WHERE status = 'delivered') AS delivered, \
               COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled \
             FROM orders",
        )
        .fetch_one(self.pool)
        .await?;

        let revenue: Money = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0)::numeric(14, 2) FROM orders \
             WHERE payment_status = 'paid'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(StoreStats {
            users,
            products,
            low_stock_products,
            orders,
            revenue,
        })
    }
}
