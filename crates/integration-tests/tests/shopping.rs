//! Integration tests for the cart, checkout and order lifecycle.
//!
//! These tests require:
//! - A running `PostgreSQL` database (`PASAL_DATABASE_URL` set)
//! - The API server running (cargo run -p pasal-api)

use pasal_integration_tests::{TestContext, TestUser, shipping_address};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

async fn product_stock(ctx: &TestContext, user: &TestUser, id: &Value) -> i64 {
    let resp = ctx
        .authed(Method::GET, &format!("/products/{id}"), user)
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid product");
    body["stock"].as_i64().expect("stock")
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_checkout_cancel() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let shopper = ctx.register().await;
    let product = ctx.create_product(&admin, "250.00", 5).await;
    let product_id = &product["id"];

    // Add twice: quantities merge into one line
    for _ in 0..2 {
        let resp = ctx
            .authed(Method::POST, "/cart", &shopper)
            .json(&json!({"product_id": product_id, "quantity": 2}))
            .send()
            .await
            .expect("Failed to add to cart");
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = ctx
        .authed(Method::GET, "/cart", &shopper)
        .send()
        .await
        .expect("Failed to get cart");
    let cart: Value = resp.json().await.expect("Invalid cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["item_count"], 4);
    assert_eq!(cart["subtotal"], "1000.00");

    // More than in stock
    let resp = ctx
        .authed(Method::PUT, &format!("/cart/{product_id}"), &shopper)
        .json(&json!({"quantity": 6}))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(Method::POST, "/orders", &shopper)
        .json(&json!({
            "shipping_address": shipping_address(),
            "payment_method": "cash_on_delivery",
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Invalid order");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"], "1000.00");
    assert_eq!(product_stock(&ctx, &shopper, product_id).await, 1);

    // Ordering from the cart empties it
    let cart: Value = ctx
        .authed(Method::GET, "/cart", &shopper)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Invalid cart");
    assert_eq!(cart["item_count"], 0);

    let order_id = &order["id"];
    let resp = ctx
        .authed(Method::POST, &format!("/orders/{order_id}/cancel"), &shopper)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.expect("Invalid order");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(product_stock(&ctx, &shopper, product_id).await, 5);

    // Already cancelled
    let resp = ctx
        .authed(Method::POST, &format!("/orders/{order_id}/cancel"), &shopper)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_orders_are_private() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let owner = ctx.register().await;
    let stranger = ctx.register().await;
    let product = ctx.create_product(&admin, "99.00", 3).await;

    let order: Value = ctx
        .authed(Method::POST, "/orders", &owner)
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
    let path = format!("/orders/{}", order["id"]);

    let resp = ctx
        .authed(Method::GET, &path, &stranger)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ctx
        .authed(Method::GET, &path, &admin)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_review_updates_rating() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let shopper = ctx.register().await;
    let product = ctx.create_product(&admin, "10.00", 1).await;

    let resp = ctx
        .authed(Method::POST, "/reviews", &shopper)
        .json(&json!({"product_id": product["id"], "rating": 4, "comment": "Solid"}))
        .send()
        .await
        .expect("Failed to post review");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = ctx
        .authed(Method::POST, "/reviews", &shopper)
        .json(&json!({"product_id": product["id"], "rating": 5}))
        .send()
        .await
        .expect("Failed to post review");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let refreshed: Value = ctx
        .authed(Method::GET, &format!("/products/{}", product["id"]), &shopper)
        .send()
        .await
        .expect("Failed to get product")
        .json()
        .await
        .expect("Invalid product");
    assert_eq!(refreshed["review_count"], 1);
}
