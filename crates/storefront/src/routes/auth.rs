//! Authentication route handlers.
//!
//! Password accounts stored locally. The session holds a `CurrentUser`; a
//! guest cart in the session is merged into the saved cart on login.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use insightshop_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, GuestCartItem, User, session_keys};
use crate::services::AuthService;
use crate::services::CartService;
use crate::services::auth::Registration;
use crate::state::AppState;

use super::today;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/password-reset", post(start_password_reset))
        .route("/api/auth/password-reset/confirm", post(reset_password))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirm {
    pub token: String,
    pub password: String,
}

/// Response after login or registration.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    /// Guest cart lines folded into the saved cart.
    pub merged_cart_lines: usize,
}

/// Put `user` in the session and fold in any guest cart.
async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<usize> {
    let guest_items: Vec<GuestCartItem> = session
        .get(session_keys::GUEST_CART)
        .await?
        .unwrap_or_default();

    let merged = if guest_items.is_empty() {
        0
    } else {
        let mut tx = state.pool().begin().await?;
        let merged = CartService::new(&mut tx, today())
            .merge_guest_cart(user.id, &guest_items)
            .await?;
        tx.commit().await?;
        session
            .remove::<Vec<GuestCartItem>>(session_keys::GUEST_CART)
            .await?;
        merged
    };

    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        is_admin: user.is_admin,
    };
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(merged)
}

/// Create an account and log in.
///
/// POST /api/auth/register
#[instrument(skip_all)]
async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let mut tx = state.pool().begin().await?;
    let (user, token) = AuthService::new(&mut tx).register(&body).await?;
    tx.commit().await?;

    if let Err(e) = state
        .email()
        .send_verification(user.email.as_str(), user.display_name(), &token.token)
        .await
    {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send verification email");
    }

    let merged_cart_lines = start_session(&state, &session, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user,
            merged_cart_lines,
        }),
    ))
}

/// POST /api/auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let mut conn = state.pool().acquire().await?;
    let user = AuthService::new(&mut conn)
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;
    drop(conn);

    let merged_cart_lines = start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, merged_cart_lines, "User logged in");
    Ok(Json(SessionResponse {
        user,
        merged_cart_lines,
    }))
}

/// POST /api/auth/logout
async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, RequireUser(current): RequireUser) -> Result<Json<User>> {
    load_user(&state, current.id).await.map(Json)
}

pub(super) async fn load_user(state: &AppState, id: UserId) -> Result<User> {
    let mut conn = state.pool().acquire().await?;
    UserRepository::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_owned()))
}

/// POST /api/auth/verify-email
async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<User>> {
    let mut conn = state.pool().acquire().await?;
    let user = AuthService::new(&mut conn).verify_email(&body.token).await?;
    tracing::info!(user_id = %user.id, "Email verified");
    Ok(Json(user))
}

/// Always answers the same way so the endpoint can't be used to probe for
/// registered addresses.
///
/// POST /api/auth/password-reset
#[instrument(skip_all)]
async fn start_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let mut conn = state.pool().acquire().await?;
    let issued = AuthService::new(&mut conn)
        .start_password_reset(&body.email, chrono::Utc::now())
        .await?;
    drop(conn);

    if let Some((user, token)) = issued
        && let Err(e) = state
            .email()
            .send_password_reset(user.email.as_str(), user.display_name(), &token.token)
            .await
    {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "If that address has an account, a reset link is on its way."
        })),
    ))
}

/// POST /api/auth/password-reset/confirm
#[instrument(skip_all)]
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirm>,
) -> Result<StatusCode> {
    let mut tx = state.pool().begin().await?;
    AuthService::new(&mut tx)
        .reset_password(&body.token, &body.password, chrono::Utc::now())
        .await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
