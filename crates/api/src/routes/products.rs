//! Product routes: listing, relevance search, detail and admin CRUD.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use pasal_core::search::{self, MAX_PER_PAGE, SearchQuery, SortKey};
use pasal_core::{Money, ProductId};

use crate::db::ProductRepository;
use crate::db::products::ProductFilter;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductInput, ProductUpdate};
use crate::state::AppState;

/// Build the products router, mounted at `/api/products`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/search", get(search_catalog))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Query parameters for the plain listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Category slug.
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for relevance search.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    /// Comma-separated category slugs.
    pub category: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub min_rating: Option<Decimal>,
    #[serde(default)]
    pub in_stock: bool,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SearchParams {
    fn into_query(self) -> SearchQuery {
        SearchQuery {
            text: self.q,
            categories: self
                .category
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            in_stock: self.in_stock,
            sort: self.sort.as_deref().map(SortKey::parse).unwrap_or_default(),
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(0),
        }
    }
}

/// Active products with optional category, text and price filters.
#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<ProductPage>> {
    let (limit, offset) = crate::db::page_bounds(params.page, params.per_page, MAX_PER_PAGE);
    let filter = ProductFilter {
        category: params.category.filter(|c| !c.trim().is_empty()),
        text: params.q.filter(|q| !q.trim().is_empty()),
        min_price: params.min_price,
        max_price: params.max_price,
    };

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, limit, offset)
        .await?;

    Ok(Json(ProductPage {
        products,
        total,
        page: params.page.unwrap_or(1).max(1),
        per_page: limit,
        total_pages: (total + limit - 1) / limit,
    }))
}

/// Relevance-ranked search over the cached active catalog.
#[instrument(skip(state))]
async fn search_catalog(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<serde_json::Value>> {
    let query = params.into_query();
    let catalog = state.catalog().snapshot(state.pool()).await?;

    let page = search::run(&catalog, &query, Utc::now());
    tracing::debug!(query = %page.query, total = page.total, "Catalog searched");

    serde_json::to_value(&page)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("failed to encode search results: {e}")))
}

async fn show(
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).create(&input).await?;
    state.catalog().invalidate().await;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, admin, update), fields(admin_id = %admin.id))]
async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
    JsonBody(update): JsonBody<ProductUpdate>,
) -> Result<Json<Product>> {
    update.validate().map_err(AppError::BadRequest)?;

    let product = ProductRepository::new(state.pool()).update(id, &update).await?;
    state.catalog().invalidate().await;

    Ok(Json(product))
}

/// Soft delete: the product disappears from listings but order history keeps it.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn remove(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).deactivate(id).await?;
    state.catalog().invalidate().await;

    let product_id = id.to_string();
    add_breadcrumb("catalog", "Product deactivated", Some(&[("product_id", product_id.as_str())]));
    Ok(StatusCode::NO_CONTENT)
}
