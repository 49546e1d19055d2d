//! Return (RMA) route handlers for shoppers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::Utc;

use insightshop_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{NewReturn, ReturnEligibility, ReturnRequest};
use crate::services::{OfflineGateway, ReturnService};
use crate::state::AppState;

/// Build the returns router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/returns", get(list).post(request))
        .route("/api/returns/eligibility/{order_id}", get(eligibility))
}

/// GET /api/returns
async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ReturnRequest>>> {
    let mut conn = state.pool().acquire().await?;
    let returns = ReturnService::new(&mut conn, &OfflineGateway)
        .list_for_user(user.id)
        .await?;
    Ok(Json(returns))
}

/// POST /api/returns
async fn request(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<NewReturn>,
) -> Result<(StatusCode, Json<ReturnRequest>)> {
    let mut tx = state.pool().begin().await?;
    let created = ReturnService::new(&mut tx, &OfflineGateway)
        .request(user.id, &body, Utc::now())
        .await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/returns/eligibility/{order_id}
async fn eligibility(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<ReturnEligibility>> {
    let mut conn = state.pool().acquire().await?;
    let eligibility = ReturnService::new(&mut conn, &OfflineGateway)
        .check(order_id, user.id, Utc::now())
        .await?;
    Ok(Json(eligibility))
}
