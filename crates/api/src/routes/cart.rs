//! Cart routes. Quantities are checked against current stock on every write;
//! stock is only reserved when an order is placed.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use tracing::instrument;

use pasal_core::ProductId;

use crate::db::orders::MAX_LINE_QUANTITY;
use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam};
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::state::AppState;

/// Build the cart router, mounted at `/api/cart`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(add).delete(clear))
        .route("/{product_id}", put(set_quantity).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: u32,
}

async fn show(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<Json<Cart>> {
    let lines = CartRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(Cart::from(lines)))
}

/// Add to the cart, summing with any quantity already there.
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<AddToCartRequest>,
) -> Result<(StatusCode, Json<Cart>)> {
    let carts = CartRepository::new(state.pool());
    let existing = carts.quantity(user.id, body.product_id).await?;
    let wanted = i32::try_from(body.quantity)
        .ok()
        .and_then(|q| q.checked_add(existing))
        .ok_or_else(quantity_error)?;

    ensure_available(&state, body.product_id, wanted).await?;
    carts.add(user.id, body.product_id, wanted - existing).await?;

    let lines = carts.list(user.id).await?;
    Ok((StatusCode::CREATED, Json(Cart::from(lines))))
}

/// Replace a line's quantity; zero removes the line.
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn set_quantity(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(product_id): PathParam<ProductId>,
    JsonBody(body): JsonBody<SetQuantityRequest>,
) -> Result<Json<Cart>> {
    let carts = CartRepository::new(state.pool());

    if body.quantity == 0 {
        carts.remove(user.id, product_id).await?;
    } else {
        let wanted = i32::try_from(body.quantity).map_err(|_| quantity_error())?;
        ensure_available(&state, product_id, wanted).await?;
        carts.set_quantity(user.id, product_id, wanted).await?;
    }

    let lines = carts.list(user.id).await?;
    Ok(Json(Cart::from(lines)))
}

async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(product_id): PathParam<ProductId>,
) -> Result<StatusCode> {
    if CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Cart item".to_string()))
    }
}

async fn clear(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<StatusCode> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The product must be active with at least `wanted` units in stock.
async fn ensure_available(state: &AppState, product_id: ProductId, wanted: i32) -> Result<()> {
    if wanted < 1 || wanted.unsigned_abs() > MAX_LINE_QUANTITY {
        return Err(quantity_error());
    }

    let product = ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    stock_check(&product.name, product.stock, wanted)
}

fn stock_check(name: &str, stock: i32, wanted: i32) -> Result<()> {
    match stock {
        s if s <= 0 => Err(AppError::BadRequest(format!("{name} is out of stock"))),
        s if wanted > s => Err(AppError::BadRequest(format!("Only {s} left of {name}"))),
        _ => Ok(()),
    }
}

fn quantity_error() -> AppError {
    AppError::BadRequest(format!("Quantity must be between 1 and {MAX_LINE_QUANTITY}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_check() {
        assert!(stock_check("Pashmina", 5, 5).is_ok());
        assert!(matches!(
            stock_check("Pashmina", 5, 6),
            Err(AppError::BadRequest(msg)) if msg == "Only 5 left of Pashmina"
        ));
        assert!(matches!(
            stock_check("Pashmina", 0, 1),
            Err(AppError::BadRequest(msg)) if msg == "Pashmina is out of stock"
        ));
    }

    #[test]
    fn test_add_request_defaults_to_one() {
        let body: AddToCartRequest = serde_json::from_str(r#"{"product_id": 7}"#).unwrap();
        assert_eq!(body.quantity, 1);
        assert_eq!(body.product_id, ProductId::new(7));
    }
}
