//! Catalog types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pasal_core::search::CatalogItem;
use pasal_core::{CategoryId, Money, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for creating or replacing a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when omitted.
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl CategoryInput {
    /// Trimmed name and the slug to store.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message if the name or slug is empty.
    pub fn normalized(&self) -> Result<(String, String), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("category name is required".to_string());
        }
        let slug = slugify(self.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err("category slug must contain letters or digits".to_string());
        }
        Ok((name.to_string(), slug))
    }
}

/// A product row joined with its category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_trending: bool,
    pub rating: Decimal,
    pub review_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for CatalogItem {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            category_id: product.category_id,
            category: product.category_name.unwrap_or_default(),
            category_slug: product.category_slug.unwrap_or_default(),
            price: product.price,
            rating: product.rating,
            review_count: product.review_count,
            stock: product.stock,
            trending: product.is_trending,
            image_url: product.image_url,
            created_at: product.created_at,
        }
    }
}

/// Body for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub stock: i32,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_trending: bool,
}

impl ProductInput {
    /// Check field constraints the schema would otherwise reject.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("product name is required".to_string());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Body for a partial product update. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category_id: Option<CategoryId>,
    pub stock: Option<i32>,
    pub image_url: Option<String>,
    pub is_trending: Option<bool>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// # Errors
    ///
    /// Returns a client-facing message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("product name cannot be blank".to_string());
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err("stock cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Lower-case ASCII slug: runs of anything other than letters and digits
/// become a single `-`, with no leading or trailing dash.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
