//! Integration tests for admin-only endpoints.
//!
//! These tests require:
//! - A running `PostgreSQL` database (`PASAL_DATABASE_URL` set)
//! - The API server running (cargo run -p pasal-api)

use pasal_integration_tests::TestContext;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customers_cannot_use_admin_endpoints() {
    let ctx = TestContext::new();
    let shopper = ctx.register().await;

    for path in ["/admin/stats", "/admin/users", "/orders/admin/all"] {
        let resp = ctx
            .authed(Method::GET, path, &shopper)
            .send()
            .await
            .expect("Failed to call admin endpoint");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }

    let resp = ctx
        .authed(Method::POST, "/products", &shopper)
        .json(&json!({"name": "Nope", "price": "1.00"}))
        .send()
        .await
        .expect("Failed to call create product");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_stats_and_user_management() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let customer = ctx.register().await;

    let resp = ctx
        .authed(Method::GET, "/admin/stats", &admin)
        .send()
        .await
        .expect("Failed to get stats");
    assert_eq!(resp.status(), StatusCode::OK);
    let stats: Value = resp.json().await.expect("Invalid stats");
    assert!(stats["users"].as_i64().is_some_and(|n| n >= 2));

    // Admins cannot demote themselves
    let resp = ctx
        .authed(Method::PUT, &format!("/admin/users/{}/role", admin.id), &admin)
        .json(&json!({"role": "customer"}))
        .send()
        .await
        .expect("Failed to set role");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(Method::DELETE, &format!("/admin/users/{}", customer.id), &admin)
        .send()
        .await
        .expect("Failed to deactivate user");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // The deactivated account's token stops working
    let resp = ctx
        .authed(Method::GET, "/auth/me", &customer)
        .send()
        .await
        .expect("Failed to call me");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_search_finds_new_product() {
    let ctx = TestContext::new();
    let admin = ctx.register_admin().await;
    let product = ctx.create_product(&admin, "42.00", 2).await;
    let name = product["name"].as_str().expect("name");

    let url = reqwest::Url::parse_with_params(
        &pasal_integration_tests::api("/products/search"),
        &[("q", name)],
    )
    .expect("Invalid search URL");
    let resp = ctx
        .client
        .get(url)
        .send()
        .await
        .expect("Failed to search");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid search response");
    assert_eq!(body["hits"][0]["id"], product["id"]);
}
