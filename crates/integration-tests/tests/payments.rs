//! Integration tests for payment settlement against the database.
//!
//! These tests require:
//! - A running `PostgreSQL` database (`PASAL_DATABASE_URL` set)
//! - The API server running (cargo run -p pasal-api)

use pasal_api::db::{OrderRepository, RepositoryError};
use pasal_core::{OrderId, OrderStatus, PaymentStatus};
use pasal_integration_tests::{TestContext, shipping_address};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cancelled_order_cannot_be_marked_paid() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let shopper = ctx.register().await;
    let product = ctx.create_product(&admin, "120.00", 4).await;

    let order: Value = ctx
        .authed(Method::POST, "/orders", &shopper)
        .json(&json!({
            "items": [{"product_id": product["id"], "quantity": 1}],
            "shipping_address": shipping_address(),
        }))
        .send()
        .await
        .expect("Failed to place order")
        .json()
        .await
        .expect("Invalid order");
    let raw_id = i32::try_from(order["id"].as_i64().expect("order id")).expect("order id range");

    let resp = ctx
        .authed(Method::POST, &format!("/orders/{raw_id}/cancel"), &shopper)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);

    // A payment confirmation arriving after the cancel committed
    let pool = ctx.pool().await;
    let orders = OrderRepository::new(&pool);
    let result = orders.mark_paid(OrderId::new(raw_id), "late-confirmation").await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));

    let stored = orders
        .get(OrderId::new(raw_id))
        .await
        .expect("Failed to load order")
        .expect("Order exists");
    assert_eq!(stored.order.status, OrderStatus::Cancelled);
    assert_ne!(stored.order.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_mark_paid_on_missing_order_is_not_found() {
    let ctx = TestContext::new();
    let pool = ctx.pool().await;
    let result = OrderRepository::new(&pool)
        .mark_paid(OrderId::new(i32::MAX), "nothing")
        .await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}
