//! Address repository.
//!
//! A user has at most one default address. Making an address the default
//! clears the flag on the others in the same transaction. A user's first
//! address becomes the default automatically, and deleting the default hands
//! the flag to the newest remaining address.

use sqlx::{PgPool, Postgres, Transaction};

use pasal_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, line1, line2, city, state, \
     postal_code, country, is_default, created_at, updated_at";

/// Repository for address database operations.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at DESC, id DESC"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(addresses)
    }

    /// Get an address owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || !has_any;

        let sql = format!(
            "INSERT INTO addresses \
               (user_id, full_name, phone, line1, line2, city, state, postal_code, country, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ADDRESS_COLUMNS}"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .bind(input.full_name.trim())
            .bind(input.phone.trim())
            .bind(input.line1.trim())
            .bind(input.line2.as_deref())
            .bind(input.city.trim())
            .bind(input.state.trim())
            .bind(input.postal_code.trim())
            .bind(input.country())
            .bind(is_default)
            .fetch_one(&mut *tx)
            .await?;

        if is_default {
            clear_other_defaults(&mut tx, user_id, address.id).await?;
        }
        tx.commit().await?;

        Ok(address)
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE addresses SET full_name = $3, phone = $4, line1 = $5, line2 = $6, city = $7, \
               state = $8, postal_code = $9, country = $10, is_default = is_default OR $11, \
               updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {ADDRESS_COLUMNS}"
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(input.full_name.trim())
            .bind(input.phone.trim())
            .bind(input.line1.trim())
            .bind(input.line2.as_deref())
            .bind(input.city.trim())
            .bind(input.state.trim())
            .bind(input.postal_code.trim())
            .bind(input.country())
            .bind(input.is_default)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if input.is_default {
            clear_other_defaults(&mut tx, user_id, id).await?;
        }
        tx.commit().await?;

        Ok(address)
    }

    /// Delete an address. Removing the default promotes the newest
    /// remaining address in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such address.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                "UPDATE addresses SET is_default = TRUE, updated_at = NOW() \
                 WHERE id = (SELECT id FROM addresses WHERE user_id = $1 \
                             ORDER BY created_at DESC, id DESC LIMIT 1)",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_other_defaults(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    keep: AddressId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE addresses SET is_default = FALSE, updated_at = NOW() \
         WHERE user_id = $1 AND id <> $2 AND is_default",
    )
    .bind(user_id)
    .bind(keep)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
