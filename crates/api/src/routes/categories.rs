//! Category routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use pasal_core::CategoryId;

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput};
use crate::state::AppState;

/// Build the categories router, mounted at `/api/categories`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list_active().await?;
    Ok(Json(categories))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let (name, slug) = input.normalized().map_err(AppError::BadRequest)?;

    let category = CategoryRepository::new(state.pool())
        .create(&name, &slug, input.description.trim())
        .await?;
    state.catalog().invalidate().await;

    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, admin, input), fields(admin_id = %admin.id))]
async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<CategoryId>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> Result<Json<Category>> {
    let (name, slug) = input.normalized().map_err(AppError::BadRequest)?;

    let category = CategoryRepository::new(state.pool())
        .update(id, &name, &slug, input.description.trim())
        .await?;
    state.catalog().invalidate().await;

    Ok(Json(category))
}

/// Soft delete. Products keep their category reference.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn remove(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).deactivate(id).await?;
    state.catalog().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
