//! Payment routes.
//!
//! ```text
//! GET  /providers          - Providers enabled on this server
//! POST /stripe/checkout    - Create a Checkout Session for an order
//! POST /stripe/webhook     - Stripe event delivery (signed)
//! POST /esewa/initiate     - Signed form fields for the eSewa redirect
//! GET  /esewa/verify       - Verify eSewa's `?data=` return payload
//! POST /khalti/initiate    - Start a Khalti payment
//! POST /khalti/verify      - Look up a Khalti payment by pidx
//! ```
//!
//! Each initiate call stores the provider's reference on the order; verify
//! calls find the order by that reference and mark it paid or failed.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use pasal_core::{OrderId, OrderStatus, PaymentProvider, PaymentStatus};

use crate::db::{OrderRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, QueryParams};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderWithItems, User};
use crate::services::payments::PaymentError;
use crate::services::payments::esewa::EsewaForm;
use crate::services::payments::khalti::{KhaltiInitiateRequest, KhaltiInitiation, LookupOutcome};
use crate::services::payments::stripe::{CheckoutLine, CheckoutRequest, SessionObject};
use crate::state::AppState;

/// Stripe event that settles a Checkout Session.
const SESSION_COMPLETED: &str = "checkout.session.completed";

/// Stripe event for a session that lapsed unpaid.
const SESSION_EXPIRED: &str = "checkout.session.expired";

/// Build the payments router, mounted at `/api/payments`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/providers", get(providers))
        .route("/stripe/checkout", post(stripe_checkout))
        .route("/stripe/webhook", post(stripe_webhook))
        .route("/esewa/initiate", post(esewa_initiate))
        .route("/esewa/verify", get(esewa_verify))
        .route("/khalti/initiate", post(khalti_initiate))
        .route("/khalti/verify", post(khalti_verify))
}

#[derive(Debug, Deserialize)]
pub struct PayOrderRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct StripeCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EsewaVerifyParams {
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct KhaltiVerifyRequest {
    pub pidx: String,
}

#[derive(Debug, Serialize)]
pub struct KhaltiVerification {
    /// Status as reported by Khalti.
    pub khalti_status: String,
    pub order: Order,
}

async fn providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "providers": state.payments().enabled() }))
}

#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %body.order_id))]
async fn stripe_checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PayOrderRequest>,
) -> Result<Json<StripeCheckoutResponse>> {
    let stripe = state.payments().stripe()?;
    let order = payable_order(&state, &user, body.order_id).await?;
    let id = order.order.id;

    let lines = order
        .items
        .iter()
        .map(|item| {
            Ok(CheckoutLine {
                name: &item.product_name,
                unit_amount: minor_units(item.unit_price)?,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let config = state.config();
    let session = stripe
        .create_checkout_session(&CheckoutRequest {
            order_id: id,
            lines,
            customer_email: user.email.as_str(),
            success_url: config.frontend_link(&format!(
                "/payment/success?provider=stripe&order_id={id}&session_id={{CHECKOUT_SESSION_ID}}"
            )),
            cancel_url: config.frontend_link(&format!("/payment/cancel?order_id={id}")),
        })
        .await?;

    OrderRepository::new(state.pool())
        .set_payment_reference(id, PaymentProvider::Stripe, &session.id)
        .await?;

    Ok(Json(StripeCheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Stripe webhook. Unknown event types are acknowledged and ignored.
#[instrument(skip_all)]
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<serde_json::Value>> {
    let stripe = state.payments().stripe()?;
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let event = stripe.verify_webhook(signature, &payload)?;
    tracing::info!(event_id = %event.id, kind = %event.kind, "Stripe webhook received");

    if event.kind == SESSION_COMPLETED || event.kind == SESSION_EXPIRED {
        let session: SessionObject = serde_json::from_value(event.data.object)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        let order_id = session.order_id().ok_or_else(|| {
            PaymentError::InvalidPayload("session has no order reference".to_string())
        })?;
        let orders = OrderRepository::new(state.pool());
        let order = orders.get_header(order_id).await?;

        if event.kind == SESSION_EXPIRED {
            orders.mark_failed(order.id).await?;
        } else if session.payment_status.as_deref() == Some("paid") {
            settle(&state, &order, &session.id).await?;
        } else {
            tracing::info!(order_id = %order.id, "Stripe session completed without payment yet");
        }
    }

    Ok(Json(json!({ "received": true })))
}

#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %body.order_id))]
async fn esewa_initiate(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PayOrderRequest>,
) -> Result<Json<EsewaForm>> {
    let esewa = state.payments().esewa()?;
    let order = payable_order(&state, &user, body.order_id).await?.order;

    let transaction_uuid = format!("{}-{}", order.id, Uuid::new_v4().simple());
    let config = state.config();
    let form = esewa.payment_form(
        order.total_amount,
        &transaction_uuid,
        config.frontend_link("/payment/esewa/success"),
        config.frontend_link(&format!("/payment/esewa/failure?order_id={}", order.id)),
    )?;

    OrderRepository::new(state.pool())
        .set_payment_reference(order.id, PaymentProvider::Esewa, &transaction_uuid)
        .await?;

    Ok(Json(form))
}

/// Verify the payload eSewa appends to the success URL.
#[instrument(skip_all)]
async fn esewa_verify(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<EsewaVerifyParams>,
) -> Result<Json<Order>> {
    let callback = state.payments().esewa()?.verify_callback(&params.data)?;

    let orders = OrderRepository::new(state.pool());
    let order = orders
        .find_by_payment_reference(PaymentProvider::Esewa, &callback.transaction_uuid)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    if !callback.is_complete() {
        orders.mark_failed(order.id).await?;
        return Err(PaymentError::NotCompleted(callback.status).into());
    }
    if callback.total_amount != order.total_amount.amount() {
        tracing::warn!(
            order_id = %order.id,
            paid = %callback.total_amount,
            expected = %order.total_amount,
            "eSewa amount mismatch"
        );
        return Err(PaymentError::AmountMismatch.into());
    }

    let reference = callback.transaction_uuid;
    Ok(Json(settle(&state, &order, &reference).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %body.order_id))]
async fn khalti_initiate(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<PayOrderRequest>,
) -> Result<Json<KhaltiInitiation>> {
    let khalti = state.payments().khalti()?;
    let order = payable_order(&state, &user, body.order_id).await?.order;

    let config = state.config();
    let return_url = config.frontend_link("/payment/khalti");
    let order_ref = order.id.to_string();
    let order_name = format!("Order #{}", order.id);

    let initiation = khalti
        .initiate(&KhaltiInitiateRequest {
            return_url: &return_url,
            website_url: config.frontend_url.as_str(),
            amount: minor_units(order.total_amount)?,
            purchase_order_id: &order_ref,
            purchase_order_name: &order_name,
        })
        .await?;

    OrderRepository::new(state.pool())
        .set_payment_reference(order.id, PaymentProvider::Khalti, &initiation.pidx)
        .await?;

    Ok(Json(initiation))
}

/// Look up a Khalti payment and settle the order accordingly.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn khalti_verify(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<KhaltiVerifyRequest>,
) -> Result<Json<KhaltiVerification>> {
    let khalti = state.payments().khalti()?;
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .find_by_payment_reference(PaymentProvider::Khalti, &body.pidx)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let lookup = khalti.lookup(&body.pidx).await?;

    let order = match lookup.outcome() {
        LookupOutcome::Completed => {
            if lookup.total_amount != minor_units(order.total_amount)? {
                tracing::warn!(
                    order_id = %order.id,
                    paid = lookup.total_amount,
                    "Khalti amount mismatch"
                );
                return Err(PaymentError::AmountMismatch.into());
            }
            settle(&state, &order, &lookup.pidx).await?
        }
        LookupOutcome::Failed => {
            orders.mark_failed(order.id).await?;
            orders.get_header(order.id).await?
        }
        LookupOutcome::Pending => order,
    };

    Ok(Json(KhaltiVerification {
        khalti_status: lookup.status,
        order,
    }))
}

/// The caller's order, if it can still be paid online.
async fn payable_order(state: &AppState, user: &User, id: OrderId) -> Result<OrderWithItems> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|o| o.order.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    if !order.order.awaiting_payment() {
        return Err(PaymentError::OrderNotPayable(
            "order is already paid or no longer pending".to_string(),
        )
        .into());
    }
    Ok(order)
}

/// Mark an order paid. Settling an already-paid order is a no-op so that
/// redelivered webhooks and repeated verify calls succeed.
async fn settle(state: &AppState, order: &Order, reference: &str) -> Result<Order> {
    if order.payment_status == PaymentStatus::Paid {
        return Ok(order.clone());
    }
    if order.status == OrderStatus::Cancelled {
        tracing::warn!(order_id = %order.id, "Payment received for cancelled order");
        return Err(PaymentError::OrderNotPayable("order was cancelled".to_string()).into());
    }

    OrderRepository::new(state.pool())
        .mark_paid(order.id, reference)
        .await
        .map_err(settle_error)
}

/// A cancel that lands between the read and the update surfaces as a conflict.
fn settle_error(error: RepositoryError) -> AppError {
    match error {
        RepositoryError::Conflict(reason) => PaymentError::OrderNotPayable(reason).into(),
        other => other.into(),
    }
}

fn minor_units(amount: pasal_core::Money) -> Result<i64> {
    amount
        .to_minor_units()
        .ok_or_else(|| AppError::Internal(format!("amount {amount} out of range")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_settle_on_cancelled_order_is_not_payable() {
        let error = settle_error(RepositoryError::Conflict("order was cancelled".to_string()));
        assert!(matches!(
            error,
            AppError::Payment(PaymentError::OrderNotPayable(_))
        ));
        assert_eq!(error.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_settle_on_missing_order_is_not_found() {
        let error = settle_error(RepositoryError::NotFound);
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}
