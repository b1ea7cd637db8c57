//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST /api/auth/register             - Create account, returns token
//! POST /api/auth/login                - Returns token
//! GET  /api/auth/me                   - Current user
//! PUT  /api/auth/me                   - Update name/phone
//! PUT  /api/auth/me/password          - Change password
//!
//! # Catalog
//! GET  /api/products                  - List (category, q, price range, paging)
//! GET  /api/products/search           - Relevance-ranked search
//! GET  /api/products/{id}             - Product detail
//! POST|PUT|DELETE /api/products...    - Admin CRUD
//! GET  /api/categories                - Category list
//! POST|PUT|DELETE /api/categories...  - Admin CRUD
//!
//! # Shopping (requires auth)
//! /api/cart, /api/wishlist, /api/addresses, /api/orders, /api/reviews
//!
//! # Payments
//! /api/payments/...                   - Stripe, eSewa, Khalti
//!
//! # Admin (requires admin role)
//! GET  /api/admin/stats               - Dashboard counts and revenue
//! GET  /api/admin/users               - User list
//! PUT  /api/admin/users/{id}/role     - Change role
//! DELETE /api/admin/users/{id}        - Deactivate user
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod wishlist;

use axum::Router;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Build the `/api` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/reviews", reviews::router())
        .nest("/wishlist", wishlist::router())
        .nest("/addresses", addresses::router())
        .nest("/payments", payments::router())
        .nest("/admin", admin::router())
        .layer(api_rate_limiter())
        .nest("/auth", auth::router().layer(auth_rate_limiter()))
}
