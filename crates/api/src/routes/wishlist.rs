//! Wishlist routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use pasal_core::ProductId;

use crate::db::WishlistRepository;
use crate::error::Result;
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAuth;
use crate::models::WishlistEntry;
use crate::state::AppState;

/// Build the wishlist router, mounted at `/api/wishlist`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(add))
        .route("/{product_id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<WishlistEntry>>> {
    let entries = WishlistRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(entries))
}

/// Save a product. Saving it again returns 200 instead of 201.
async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<WishlistRequest>,
) -> Result<(StatusCode, Json<Vec<WishlistEntry>>)> {
    let wishlist = WishlistRepository::new(state.pool());
    let added = wishlist.add(user.id, body.product_id).await?;
    let status = if added { StatusCode::CREATED } else { StatusCode::OK };

    Ok((status, Json(wishlist.list(user.id).await?)))
}

async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(product_id): PathParam<ProductId>,
) -> Result<StatusCode> {
    WishlistRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
