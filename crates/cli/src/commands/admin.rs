//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! # The user must have registered through the storefront first
//! is-cli admin promote ops@example.com
//!
//! is-cli admin demote ops@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `INSIGHTSHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use insightshop_core::{Email, UserId};
use insightshop_storefront::db::{RepositoryError, UserRepository};
use thiserror::Error;

use super::CommandError;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with this email.
    #[error("No user with email: {0}. Register through the storefront first")]
    UnknownUser(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

/// Grant or revoke admin access for an existing account.
///
/// Returns the ID of the updated user.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no account has this email.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<UserId, AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = super::connect().await?;
    let mut conn = pool.acquire().await.map_err(CommandError::from)?;

    let user = UserRepository::new(&mut conn)
        .set_admin(&parsed, is_admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownUser(email.to_owned()),
            other => AdminError::Repository(other),
        })?;

    if is_admin {
        tracing::info!(user_id = %user.id, "Admin access granted to {}", user.email);
    } else {
        tracing::info!(user_id = %user.id, "Admin access revoked from {}", user.email);
    }
    Ok(user.id)
}
