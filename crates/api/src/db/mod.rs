//! Database operations for the Pasal `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users` - Shopper and admin accounts (argon2 password hashes)
//! - `categories` / `products` - Catalog, soft-deleted via `is_active`
//! - `cart_items` - One row per (user, product)
//! - `orders` / `order_items` - Orders with price snapshots and payment state
//! - `reviews` - One per (user, product), aggregated onto `products`
//! - `wishlist` - Saved products
//! - `addresses` - Shipping addresses, at most one default per user
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and embedded into the
//! binary. They run at boot unless `PASAL_RUN_MIGRATIONS=false`, or via:
//! ```bash
//! cargo run -p pasal-cli -- migrate
//! ```

pub mod addresses;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod stats;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use cart::CartRepository;
pub use categories::CategoryRepository;
pub use orders::{CheckoutError, OrderRepository};
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use stats::StatsRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Turn a unique-constraint violation into `Conflict`, keeping other
    /// errors as `Database`.
    pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply any pending migrations.
///
/// Applied migrations are tracked in `_sqlx_migrations`, so running this
/// against an up-to-date database is a no-op.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails or the
/// applied history no longer matches the embedded files.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Clamp 1-based paging parameters and return `(limit, offset)` for SQL.
#[must_use]
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, max_per_page);
    let page = page.unwrap_or(1).max(1);
    let offset = i64::from(page - 1) * i64::from(per_page);
    (i64::from(per_page), offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds_defaults() {
        assert_eq!(page_bounds(None, None, 100), (20, 0));
    }

    #[test]
    fn test_page_bounds_clamps() {
        assert_eq!(page_bounds(Some(0), Some(0), 100), (1, 0));
        assert_eq!(page_bounds(Some(3), Some(500), 100), (100, 200));
    }

    #[test]
    fn test_not_found_display() {
        assert_eq!(RepositoryError::NotFound.to_string(), "not found");
    }
}
