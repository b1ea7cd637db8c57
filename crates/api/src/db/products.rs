//! Product repository.

use sqlx::PgPool;

use pasal_core::search::CatalogItem;
use pasal_core::{Money, ProductId};

use super::RepositoryError;
use crate::models::{Product, ProductInput, ProductUpdate};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.description, p.price, p.category_id,
           c.name AS category_name, c.slug AS category_slug,
           p.stock, p.image_url, p.is_trending, p.rating, p.review_count,
           p.is_active, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id AND c.is_active
";

/// Filters for the plain product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring of name or description.
    pub text: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products matching `filter`, newest first, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        const FILTER: &str = "WHERE p.is_active \
            AND ($1::text IS NULL OR LOWER(c.slug) = LOWER($1)) \
            AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2) \
            AND ($3::numeric IS NULL OR p.price >= $3) \
            AND ($4::numeric IS NULL OR p.price <= $4)";

        let pattern = filter.text.as_deref().map(like_pattern);

        let count_sql = format!(
            "SELECT COUNT(*) FROM products p \
             LEFT JOIN categories c ON c.id = p.category_id AND c.is_active {FILTER}"
        );
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        let sql = format!(
            "{PRODUCT_SELECT} {FILTER} ORDER BY p.created_at DESC, p.id DESC LIMIT $5 OFFSET $6"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(filter.category.as_deref())
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok((products, total))
    }

    /// Every active product as a search candidate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.is_active ORDER BY p.id");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(products.into_iter().map(CatalogItem::from).collect())
    }

    /// Get an active product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1 AND p.is_active");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Get a product regardless of whether it is active.
    async fn get_any(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails, including
    /// when `category_id` references a missing category.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            "INSERT INTO products \
               (name, description, price, category_id, stock, image_url, is_trending) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.category_id)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_trending)
        .fetch_one(self.pool)
        .await?;

        self.get_any(id).await
    }

    /// Insert a product or refresh the one with the same name in the same
    /// category. Used by seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn upsert_by_name(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let existing: Option<ProductId> = sqlx::query_scalar(
            "SELECT id FROM products WHERE name = $1 \
             AND category_id IS NOT DISTINCT FROM $2 ORDER BY id LIMIT 1",
        )
        .bind(input.name.trim())
        .bind(input.category_id)
        .fetch_optional(self.pool)
        .await?;

        match existing {
            Some(id) => {
                let update = ProductUpdate {
                    name: None,
                    description: Some(input.description.clone()),
                    price: Some(input.price),
                    category_id: None,
                    stock: Some(input.stock),
                    image_url: input.image_url.clone(),
                    is_trending: Some(input.is_trending),
                    is_active: Some(true),
                };
                self.update(id, &update).await
            }
            None => self.create(input).await,
        }
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET \
               name = COALESCE($2, name), \
               description = COALESCE($3, description), \
               price = COALESCE($4, price), \
               category_id = COALESCE($5, category_id), \
               stock = COALESCE($6, stock), \
               image_url = COALESCE($7, image_url), \
               is_trending = COALESCE($8, is_trending), \
               is_active = COALESCE($9, is_active), \
               updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.category_id)
        .bind(update.stock)
        .bind(update.image_url.as_deref())
        .bind(update.is_trending)
        .bind(update.is_active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_any(id).await
    }

    /// Soft-delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Wrap user text in `%...%` for `ILIKE`, escaping the pattern metacharacters.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
