//! Shipping route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::db::Shipment;
use crate::error::{AppError, Result};
use crate::middleware::OptionalUser;
use crate::models::Order;
use crate::services::CheckoutService;
use crate::services::pricing::{ShippingQuote, shipping_quotes};
use crate::state::AppState;

use super::orders::Viewer;
use super::today;

/// Build the shipping router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/shipping/rates", get(rates))
        .route("/api/shipping/track/{order_number}", get(track))
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    /// Discounted merchandise subtotal.
    #[serde(default)]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub order: Order,
    pub shipments: Vec<Shipment>,
}

/// GET /api/shipping/rates?subtotal=
async fn rates(
    State(state): State<AppState>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<Vec<ShippingQuote>>> {
    if query.subtotal.is_sign_negative() {
        return Err(AppError::BadRequest("subtotal cannot be negative".to_owned()));
    }
    Ok(Json(shipping_quotes(query.subtotal, &state.config().commerce)))
}

/// GET /api/shipping/track/{order_number}
async fn track(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(order_number): Path<String>,
) -> Result<Json<TrackingResponse>> {
    let viewer = Viewer::load(&session, user).await?;
    let mut conn = state.pool().acquire().await?;
    let (order, shipments) = CheckoutService::new(&mut conn, state.config().commerce, today())
        .track(order_number.trim(), viewer.access())
        .await?;
    Ok(Json(TrackingResponse { order, shipments }))
}
