//! Integration tests for the address book.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - The API server running (cargo run -p pasal-api)

use pasal_integration_tests::{TestContext, TestUser, shipping_address};
use reqwest::{Method, StatusCode};
use serde_json::Value;

async fn add_address(ctx: &TestContext, user: &TestUser) -> Value {
    let resp = ctx
        .authed(Method::POST, "/addresses", user)
        .json(&shipping_address())
        .send()
        .await
        .expect("Failed to add address");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Invalid address")
}

async fn list_addresses(ctx: &TestContext, user: &TestUser) -> Vec<Value> {
    ctx.authed(Method::GET, "/addresses", user)
        .send()
        .await
        .expect("Failed to list addresses")
        .json()
        .await
        .expect("Invalid address list")
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_first_address_is_default() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let first = add_address(&ctx, &user).await;
    let second = add_address(&ctx, &user).await;
    assert_eq!(first["is_default"], true);
    assert_eq!(second["is_default"], false);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_deleting_default_promotes_newest() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let first = add_address(&ctx, &user).await;
    let _second = add_address(&ctx, &user).await;
    let third = add_address(&ctx, &user).await;

    let resp = ctx
        .authed(Method::DELETE, &format!("/addresses/{}", first["id"]), &user)
        .send()
        .await
        .expect("Failed to delete address");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let remaining = list_addresses(&ctx, &user).await;
    assert_eq!(remaining.len(), 2);
    let defaults: Vec<&Value> = remaining
        .iter()
        .filter(|a| a["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults.first().map(|a| &a["id"]), Some(&third["id"]));
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_deleting_other_users_address_is_not_found() {
    let ctx = TestContext::new();
    let owner = ctx.register().await;
    let stranger = ctx.register().await;
    let address = add_address(&ctx, &owner).await;

    let resp = ctx
        .authed(Method::DELETE, &format!("/addresses/{}", address["id"]), &stranger)
        .send()
        .await
        .expect("Failed to delete address");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
