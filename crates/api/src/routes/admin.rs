//! Admin dashboard routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::Deserialize;
use tracing::instrument;

use pasal_core::{UserId, UserRole};

use crate::db::stats::StoreStats;
use crate::db::{StatsRepository, UserRepository, page_bounds};
use crate::error::{AppError, Result};
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::state::AppState;

/// Largest page of users an admin may request.
const MAX_USER_PAGE: u32 = 200;

/// Build the admin router, mounted at `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/{id}", delete(deactivate_user))
        .route("/users/{id}/role", put(set_role))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: UserRole,
}

async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<StoreStats>> {
    let stats = StatsRepository::new(state.pool()).store_stats().await?;
    Ok(Json(stats))
}

async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PageParams>,
) -> Result<Json<Vec<User>>> {
    let (limit, offset) = page_bounds(params.page, params.per_page, MAX_USER_PAGE);
    let users = UserRepository::new(state.pool()).list(limit, offset).await?;
    Ok(Json(users))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
    JsonBody(body): JsonBody<RoleUpdate>,
) -> Result<Json<User>> {
    if id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool()).set_role(id, body.role).await?;
    tracing::info!(user_id = %id, role = ?body.role, "User role changed");
    Ok(Json(user))
}

/// Soft delete: the account can no longer log in, its orders stay.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
async fn deactivate_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    PathParam(id): PathParam<UserId>,
) -> Result<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    UserRepository::new(state.pool()).deactivate(id).await?;
    tracing::info!(user_id = %id, "User deactivated");
    Ok(StatusCode::NO_CONTENT)
}
