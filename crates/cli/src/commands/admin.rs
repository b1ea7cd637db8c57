//! Admin user management commands.
//!
//! Accounts are created through `POST /api/auth/register`; these commands
//! only change the role of an account that already exists. The first admin
//! has to be promoted this way since the API never grants the role itself.
//!
//! ```bash
//! pasal-cli admin promote -e owner@example.com
//! pasal-cli admin demote -e former-staff@example.com
//! ```

use pasal_api::db::RepositoryError;
use pasal_api::db::users::UserRepository;
use pasal_core::{Email, UserRole};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No user registered with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns `AdminError::InvalidEmail` for a malformed address and
/// `AdminError::UserNotFound` if nobody registered with it.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role_by_email(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %email, role = ?role, "Role updated");
    if !user.is_active {
        tracing::warn!("Account is deactivated and cannot log in until reactivated");
    }
    Ok(())
}
