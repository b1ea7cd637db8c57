//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pasal_core::{Email, UserId, UserRole};

/// A shopper or admin account.
///
/// The password hash never leaves the repository layer except through
/// [`UserWithPassword`], so this type is safe to serialize.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with their argon2 PHC hash, for login and password change.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithPassword {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}
