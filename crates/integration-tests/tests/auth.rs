//! Integration tests for registration, login and profile management.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - The API server running (cargo run -p pasal-api)

use pasal_integration_tests::{TestContext, api, base_url};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let resp = ctx
        .client
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to call health");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to call readiness");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_register_login_and_me() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let resp = ctx
        .client
        .post(api("/auth/login"))
        .json(&json!({"email": user.email.to_uppercase(), "password": user.password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid login response");
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["role"], "customer");
    assert!(body["user"].get("password_hash").is_none());

    let resp = ctx
        .authed(Method::GET, "/auth/me", &user)
        .send()
        .await
        .expect("Failed to fetch profile");
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.expect("Invalid profile");
    assert_eq!(me["email"], user.email.as_str());
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let resp = ctx
        .client
        .post(api("/auth/register"))
        .json(&json!({"name": "Again", "email": user.email, "password": "another-pass"}))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_wrong_password_and_missing_token() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let resp = ctx
        .client
        .post(api("/auth/login"))
        .json(&json!({"email": user.email, "password": "not-the-password"}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = ctx
        .client
        .get(api("/auth/me"))
        .send()
        .await
        .expect("Failed to call me");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Invalid error body");
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_change_password() {
    let ctx = TestContext::new();
    let user = ctx.register().await;

    let resp = ctx
        .authed(Method::PUT, "/auth/me/password", &user)
        .json(&json!({"current_password": user.password, "new_password": "brand-new-pass"}))
        .send()
        .await
        .expect("Failed to change password");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = ctx
        .client
        .post(api("/auth/login"))
        .json(&json!({"email": user.email, "password": "brand-new-pass"}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
}
