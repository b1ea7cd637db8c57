//! Wishlist types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use pasal_core::{Money, ProductId, WishlistItemId};

/// A saved product with enough detail to render a card.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WishlistEntry {
    pub id: WishlistItemId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub rating: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}
