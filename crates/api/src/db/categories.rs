//! Category repository.

use sqlx::PgPool;

use pasal_core::CategoryId;

use super::RepositoryError;
use crate::models::Category;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, is_active, created_at, updated_at";

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active ORDER BY name, id");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(slug)
            .bind(description)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::conflict_on_unique(e, "category slug already exists"))
    }

    /// Insert a category or refresh the one with the same slug. Used by seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, is_active = TRUE, updated_at = NOW() \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(slug)
            .bind(description)
            .fetch_one(self.pool)
            .await?;
        Ok(category)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        name: &str,
        slug: &str,
        description: &str,
    ) -> Result<Category, RepositoryError> {
        let sql = format!(
            "UPDATE categories SET name = $2, slug = $3, description = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(name)
            .bind(slug)
            .bind(description)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::conflict_on_unique(e, "category slug already exists"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a category. Its products keep their link but the category
    /// disappears from listings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn deactivate(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE categories SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
