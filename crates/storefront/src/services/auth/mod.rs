//! Authentication service.
//!
//! Password accounts (argon2id), email verification, and password reset.
//! Verification and reset tokens are 32 random bytes sent to the user as
//! base64url; only their SHA-256 digest is stored.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgConnection;
use tracing::instrument;

use insightshop_core::Email;

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::user::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (argon2 cost grows with input).
const MAX_PASSWORD_LENGTH: usize = 128;

/// How long a password-reset link stays valid.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A one-time token: the value mailed to the user and the digest stored.
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub token: String,
    pub hash: String,
}

impl OneTimeToken {
    /// 32 random bytes, base64url encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_token(&token);
        Self { token, hash }
    }
}

/// SHA-256 hex digest of a token as presented by the user.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

/// Authentication service.
///
/// Handles registration, login, email verification and password reset.
pub struct AuthService<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> AuthService<'c> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Register a new user with email and password.
    ///
    /// Returns the user and the email-verification token to mail them.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all)]
    pub async fn register(
        &mut self,
        registration: &Registration,
    ) -> Result<(User, OneTimeToken), AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let password_hash = hash_password(&registration.password)?;

        let mut users = UserRepository::new(&mut *self.conn);
        let user = users
            .create(
                &email,
                &password_hash,
                non_empty(registration.first_name.as_deref()),
                non_empty(registration.last_name.as_deref()),
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        let token = OneTimeToken::generate();
        users.set_verification_token(user.id, &token.hash).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok((user, token))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip_all)]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = UserRepository::new(&mut *self.conn)
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;
        Ok(user)
    }

    /// Consume an email-verification token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if no user holds the token.
    pub async fn verify_email(&mut self, token: &str) -> Result<User, AuthError> {
        UserRepository::new(&mut *self.conn)
            .verify_email(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidToken)
    }

    /// Issue a password-reset token.
    ///
    /// Returns `None` for unknown emails so callers can respond identically
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if a query fails.
    #[instrument(skip_all)]
    pub async fn start_password_reset(
        &mut self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(User, OneTimeToken)>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let mut users = UserRepository::new(&mut *self.conn);
        let Some(user) = users.get_by_email(&email).await? else {
            return Ok(None);
        };

        let token = OneTimeToken::generate();
        users
            .set_reset_token(user.id, &token.hash, now + RESET_TOKEN_TTL)
            .await?;
        Ok(Some((user, token)))
    }

    /// Set a new password using a reset token. The token is consumed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for unknown or expired tokens and
    /// `AuthError::WeakPassword` if the new password is rejected.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &mut self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        validate_password(new_password)?;
        let mut users = UserRepository::new(&mut *self.conn);
        let user = users
            .find_by_reset_token(&hash_token(token), now)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        let password_hash = hash_password(new_password)?;
        users.set_password(user.id, &password_hash).await?;
        tracing::info!(user_id = %user.id, "Password reset");
        Ok(user)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse battery", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length_rules() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_token_hash_matches_generated_digest() {
        let token = OneTimeToken::generate();
        assert_eq!(token.token.len(), 43);
        assert!(!token.token.contains('='));
        assert_eq!(hash_token(&token.token), token.hash);
        assert_eq!(token.hash.len(), 64);
        assert_ne!(OneTimeToken::generate().token, token.token);
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  Ada ")), Some("Ada"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
