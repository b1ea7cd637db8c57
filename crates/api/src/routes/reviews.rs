//! Review routes. Every write recomputes the product's rating aggregate.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::instrument;

use pasal_core::{ProductId, Rating, ReviewId, UserRole};

use crate::db::ReviewRepository;
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAuth;
use crate::models::Review;
use crate::state::AppState;

/// Longest accepted comment, in characters.
const MAX_COMMENT_CHARS: usize = 2000;

/// Build the reviews router, mounted at `/api/reviews`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/product/{product_id}", get(list_for_product))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub product_id: ProductId,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

async fn list_for_product(
    State(state): State<AppState>,
    PathParam(product_id): PathParam<ProductId>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

/// Review a product, once per customer.
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let rating = Rating::new(body.rating).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let comment = body.comment.trim();
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }

    let review = ReviewRepository::new(state.pool())
        .create(user.id, body.product_id, rating, comment)
        .await?;
    state.catalog().invalidate().await;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Delete a review; authors may delete their own, admins any.
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(id): PathParam<ReviewId>,
) -> Result<StatusCode> {
    let reviews = ReviewRepository::new(state.pool());
    let review = reviews
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review".to_string()))?;

    if review.user_id != user.id && user.role != UserRole::Admin {
        return Err(AppError::Forbidden(
            "You can only delete your own reviews".to_string(),
        ));
    }

    reviews.delete(id).await?;
    state.catalog().invalidate().await;
    Ok(StatusCode::NO_CONTENT)
}
