//! Payment route handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::models::Payment;
use crate::services::payments::PaymentRequest;
use crate::services::{OfflineGateway, PaymentError, PaymentService};
use crate::state::AppState;

use super::orders::Viewer;

/// Build the payment router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/payments", post(pay))
}

/// Pay for an order through the offline gateway.
///
/// A declined attempt is still committed so the audit log keeps it.
///
/// POST /api/payments
#[instrument(skip_all, fields(order_id = %body.order_id, method = %body.method))]
async fn pay(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>)> {
    let viewer = Viewer::load(&session, user).await?;
    let mut tx = state.pool().begin().await?;
    let outcome = PaymentService::new(&mut tx, &OfflineGateway)
        .pay(body.order_id, body.method, viewer.access())
        .await;
    match outcome {
        Ok(payment) => {
            tx.commit().await?;
            Ok((StatusCode::CREATED, Json(payment)))
        }
        Err(e @ (PaymentError::Declined(_) | PaymentError::Gateway(_))) => {
            tx.commit().await?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
