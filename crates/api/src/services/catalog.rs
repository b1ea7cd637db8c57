//! Cached catalog snapshot for relevance search.
//!
//! Search scores the whole active catalog in memory, so the product list is
//! loaded once and kept for 60 seconds. Admin writes to products, categories
//! or reviews invalidate it.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use pasal_core::search::CatalogItem;

use crate::db::{ProductRepository, RepositoryError};

const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

/// Shared handle to the cached catalog.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<(), Arc<Vec<CatalogItem>>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(SNAPSHOT_TTL)
                .build(),
        }
    }

    /// The active catalog, loading it if the cached copy expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if loading fails.
    pub async fn snapshot(&self, pool: &PgPool) -> Result<Arc<Vec<CatalogItem>>, RepositoryError> {
        if let Some(items) = self.cache.get(&()).await {
            return Ok(items);
        }

        let items = Arc::new(ProductRepository::new(pool).catalog().await?);
        debug!(products = items.len(), "Catalog snapshot loaded");
        self.cache.insert((), Arc::clone(&items)).await;
        Ok(items)
    }

    /// Drop the cached snapshot so the next search reloads it.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}
