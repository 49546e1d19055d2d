//! Member profile route handlers.

use axum::{Json, Router, extract::State, routing::get};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{ProfileUpdate, User};
use crate::state::AppState;

use super::auth::load_user;

/// Build the members router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/members/me", get(profile).put(update_profile))
}

/// GET /api/members/me
async fn profile(State(state): State<AppState>, RequireUser(user): RequireUser) -> Result<Json<User>> {
    load_user(&state, user.id).await.map(Json)
}

/// PUT /api/members/me
async fn update_profile(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    body.validate().map_err(AppError::BadRequest)?;
    let mut conn = state.pool().acquire().await?;
    let updated = UserRepository::new(&mut conn)
        .update_profile(user.id, &body)
        .await?;
    Ok(Json(updated))
}
