//! Account routes: registration, login and the current user's profile.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{Result, add_breadcrumb};
use crate::extract::JsonBody;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthService, Registration, validate_name};
use crate::state::AppState;

/// Build the auth router, mounted at `/api/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
        .route("/me/password", put(change_password))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued token plus the account it belongs to.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Create a customer account.
#[instrument(skip(state, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = AuthService::new(state.pool(), state.tokens())
        .register(Registration {
            name: &body.name,
            email: &body.email,
            password: &body.password,
            phone: body.phone.as_deref(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Exchange email and password for a token.
#[instrument(skip(state, body))]
async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = AuthService::new(state.pool(), state.tokens())
        .login(&body.email, &body.password)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse { token, user }))
}

async fn me(RequireAuth(user): RequireAuth) -> Json<User> {
    Json(user)
}

/// Update name and/or phone; omitted fields are kept.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update_me(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let name = body.name.as_deref().map(validate_name).transpose()?;
    let phone = body.phone.as_deref().map(str::trim);

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, name, phone)
        .await?;

    Ok(Json(updated))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.tokens())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    add_breadcrumb("auth", "Password changed", None);
    Ok(StatusCode::NO_CONTENT)
}
