//! Review route handlers.
//!
//! Writes run in a transaction so the product's rating aggregate is
//! recomputed together with the review change.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};

use insightshop_core::{ProductId, ReviewId};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{Review, ReviewInput};
use crate::services::ReviewService;
use crate::services::reviews::MAX_PAGE;
use crate::state::AppState;

use super::Pagination;

/// Build the review router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products/{id}/reviews", get(list).post(create))
        .route("/api/reviews/{id}", put(update).delete(delete))
}

/// GET /api/products/{id}/reviews
async fn list(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Review>>> {
    let mut conn = state.pool().acquire().await?;
    let reviews = ReviewService::new(&mut conn)
        .list(product_id, page.limit().min(MAX_PAGE), page.offset())
        .await?;
    Ok(Json(reviews))
}

/// POST /api/products/{id}/reviews
async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    let mut tx = state.pool().begin().await?;
    let review = ReviewService::new(&mut tx)
        .create(user.id, product_id, &input)
        .await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// PUT /api/reviews/{id}
async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ReviewId>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Review>> {
    let mut tx = state.pool().begin().await?;
    let review = ReviewService::new(&mut tx).update(id, user.id, &input).await?;
    tx.commit().await?;
    Ok(Json(review))
}

/// Admins may delete any review; shoppers only their own.
///
/// DELETE /api/reviews/{id}
async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    let owner = (!user.is_admin).then_some(user.id);
    let mut tx = state.pool().begin().await?;
    ReviewService::new(&mut tx).delete(id, owner).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
