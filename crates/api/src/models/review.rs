//! Product review types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pasal_core::{ProductId, Rating, ReviewId, UserId};

/// A review with the reviewer's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub user_name: String,
    pub product_id: ProductId,
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}
