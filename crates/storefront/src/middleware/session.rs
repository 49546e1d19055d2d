//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions.

use rand::distr::{Alphanumeric, SampleString};
use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "insightshop_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Length of a guest conversation key.
const GUEST_CHAT_KEY_LENGTH: usize = 32;

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions` table is created by the migrations.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The guest's conversation key, created on first use.
///
/// Binds guest chat sessions to the HTTP session without exposing the
/// session ID itself.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn guest_chat_key(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(key) = session.get::<String>(session_keys::GUEST_CHAT_KEY).await? {
        return Ok(key);
    }
    let key = Alphanumeric.sample_string(&mut rand::rng(), GUEST_CHAT_KEY_LENGTH);
    session.insert(session_keys::GUEST_CHAT_KEY, &key).await?;
    Ok(key)
}
