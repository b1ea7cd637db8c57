//! Integration tests for the Pasal API.
//!
//! The tests drive a running server over HTTP and are ignored by default.
//!
//! ```bash
//! # Start the database and the API
//! cargo run -p pasal-api
//!
//! # Run the ignored tests against it
//! cargo test -p pasal-integration-tests -- --ignored
//! ```
//!
//! `PASAL_TEST_BASE_URL` points at the server (default
//! `http://localhost:5000`). Tests that need an admin account promote a fresh
//! user directly in `PASAL_DATABASE_URL`.

#![allow(clippy::missing_panics_doc)]

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("PASAL_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Absolute URL for an API path such as `/products`.
#[must_use]
pub fn api(path: &str) -> String {
    format!("{}/api{path}", base_url())
}

/// A registered account and its bearer token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub token: String,
}

/// Shared HTTP client plus helpers for authenticated calls.
#[derive(Debug, Clone)]
pub struct TestContext {
    pub client: Client,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        dotenvy::dotenv().ok();
        Self {
            client: Client::builder()
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// A request carrying `user`'s bearer token.
    #[must_use]
    pub fn authed(&self, method: reqwest::Method, path: &str, user: &TestUser) -> RequestBuilder {
        self.client
            .request(method, api(path))
            .bearer_auth(&user.token)
    }

    /// Register a customer with a unique email.
    pub async fn register(&self) -> TestUser {
        let email = format!("test-{}@example.com", Uuid::new_v4().simple());
        let password = "integration-pass".to_string();

        let resp = self
            .client
            .post(api("/auth/register"))
            .json(&json!({
                "name": "Integration Tester",
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.expect("Invalid register response");
        TestUser {
            id: body["user"]["id"].as_i64().expect("user id"),
            email,
            password,
            token: body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Direct connection to the server's database.
    pub async fn pool(&self) -> sqlx::PgPool {
        let database_url =
            std::env::var("PASAL_DATABASE_URL").expect("PASAL_DATABASE_URL must be set");
        sqlx::PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to database")
    }

    /// Register a user and grant it the admin role in the database.
    pub async fn register_admin(&self) -> TestUser {
        let user = self.register().await;
        let pool = self.pool().await;
        sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .expect("Failed to promote user");
        user
    }

    /// Create a product as `admin` and return its JSON.
    pub async fn create_product(&self, admin: &TestUser, price: &str, stock: i32) -> Value {
        let resp = self
            .authed(reqwest::Method::POST, "/products", admin)
            .json(&json!({
                "name": format!("Test product {}", Uuid::new_v4().simple()),
                "description": "Created by integration tests",
                "price": price,
                "stock": stock,
            }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.expect("Invalid product response")
    }
}

/// A complete shipping address body.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "full_name": "Integration Tester",
        "phone": "9800000000",
        "line1": "Thamel Marg 12",
        "city": "Kathmandu",
        "state": "Bagmati",
        "postal_code": "44600",
    })
}
