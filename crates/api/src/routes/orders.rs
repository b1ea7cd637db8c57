//! Order routes: checkout, history, cancellation and admin fulfillment.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use pasal_core::{AddressId, OrderId, OrderStatus, PaymentProvider, UserRole};

use crate::db::{AddressRepository, CartRepository, OrderRepository, page_bounds};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, OrderLine, OrderWithItems, ShippingAddress};
use crate::services::payments::PaymentError;
use crate::state::AppState;

/// Largest page of orders an admin may request.
const MAX_ADMIN_PAGE: u32 = 100;

/// Build the orders router, mounted at `/api/orders`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_mine).post(place))
        .route("/admin/all", get(list_all))
        .route("/{id}", get(show))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/status", put(set_status))
}

/// Checkout request. Without `items` the whole cart is ordered.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Option<Vec<OrderLine>>,
    pub address_id: Option<AddressId>,
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, alias = "payment_provider")]
    pub payment_method: PaymentProvider,
}

#[derive(Debug, Deserialize)]
pub struct AdminOrderParams {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: u32,
    pub per_page: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[instrument(skip(state, user, body), fields(user_id = %user.id, provider = %body.payment_method))]
async fn place(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let provider = body.payment_method;
    if provider.is_online() && !state.payments().enabled().contains(&provider) {
        return Err(PaymentError::NotConfigured(provider).into());
    }

    let shipping = match (body.address_id, body.shipping_address) {
        (Some(address_id), _) => ShippingAddress::from(
            AddressRepository::new(state.pool())
                .get(user.id, address_id)
                .await?,
        ),
        (None, Some(address)) => address,
        (None, None) => {
            return Err(AppError::BadRequest(
                "address_id or shipping_address is required".to_string(),
            ));
        }
    };
    shipping.validate().map_err(AppError::BadRequest)?;

    let from_cart = body.items.is_none();
    let lines = match body.items {
        Some(items) => items,
        None => CartRepository::new(state.pool())
            .list(user.id)
            .await?
            .into_iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                quantity: u32::try_from(line.quantity).unwrap_or(0),
            })
            .collect(),
    };

    let order = OrderRepository::new(state.pool())
        .create(user.id, &lines, &shipping, provider, from_cart)
        .await?;

    let order_id = order.order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_mine(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// An order with its items, visible to its owner and to admins.
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.order.user_id == user.id || user.role == UserRole::Admin)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    Ok(Json(order))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool()).cancel(user.id, id).await?;
    state.catalog().invalidate().await;
    Ok(Json(order))
}

async fn list_all(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    QueryParams(params): QueryParams<AdminOrderParams>,
) -> Result<Json<OrderPage>> {
    let (limit, offset) = page_bounds(params.page, params.per_page, MAX_ADMIN_PAGE);
    let (orders, total) = OrderRepository::new(state.pool())
        .list_all(params.status, limit, offset)
        .await?;

    Ok(Json(OrderPage {
        orders,
        total,
        page: params.page.unwrap_or(1).max(1),
        per_page: limit,
    }))
}

/// Move an order along its fulfillment path.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn set_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<OrderId>,
    JsonBody(body): JsonBody<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;

    if order.status == OrderStatus::Cancelled {
        state.catalog().invalidate().await;
    }
    tracing::info!(order_id = %id, status = ?order.status, "Order status updated");
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_place_order_request_defaults() {
        let body: PlaceOrderRequest = serde_json::from_str(
            r#"{"shipping_address": {"full_name": "Sita", "phone": "98", "line1": "Thamel", "city": "Kathmandu"}}"#,
        )
        .unwrap();
        assert!(body.items.is_none());
        assert_eq!(body.payment_method, PaymentProvider::CashOnDelivery);
        assert_eq!(body.shipping_address.unwrap().country, "Nepal");
    }

    #[test]
    fn test_place_order_request_with_items() {
        let body: PlaceOrderRequest = serde_json::from_str(
            r#"{"items": [{"product_id": 1, "quantity": 2}], "address_id": 4, "payment_method": "khalti"}"#,
        )
        .unwrap();
        assert_eq!(body.items.unwrap().len(), 1);
        assert_eq!(body.address_id, Some(AddressId::new(4)));
        assert_eq!(body.payment_method, PaymentProvider::Khalti);
    }
}
