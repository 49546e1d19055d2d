//! Order route handlers: checkout, history, detail, cancellation.
//!
//! Guests can see the orders placed from their session; the IDs are kept
//! under `guest_orders`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tower_sessions::Session;
use tracing::instrument;

use insightshop_core::{Email, OrderId};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalUser, RequireUser};
use crate::models::{CurrentUser, GuestCartItem, Order, OrderWithItems, session_keys};
use crate::services::checkout::CheckoutError;
use crate::services::{Buyer, CheckoutRequest, CheckoutService, OrderAccess};
use crate::state::AppState;

use super::{Pagination, today};

/// Build the order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list).post(place))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/cancel", post(cancel))
}

/// Who is asking about an order.
pub(super) enum Viewer {
    Admin,
    User(CurrentUser),
    Guest(Vec<OrderId>),
}

impl Viewer {
    pub(super) async fn load(session: &Session, user: Option<CurrentUser>) -> Result<Self> {
        Ok(match user {
            Some(user) if user.is_admin => Self::Admin,
            Some(user) => Self::User(user),
            None => Self::Guest(
                session
                    .get::<Vec<OrderId>>(session_keys::GUEST_ORDERS)
                    .await?
                    .unwrap_or_default(),
            ),
        })
    }

    pub(super) fn access(&self) -> OrderAccess<'_> {
        match self {
            Self::Admin => OrderAccess::Admin,
            Self::User(user) => OrderAccess::User(user.id),
            Self::Guest(ids) => OrderAccess::Guest(ids),
        }
    }
}

/// Check out the request's cart.
///
/// POST /api/orders
#[instrument(skip_all)]
async fn place(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let guest_items: Vec<GuestCartItem>;
    let guest_email: Email;
    let buyer = match &user {
        Some(user) => Buyer::User(user.id),
        None => {
            let raw = body
                .guest_email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .ok_or(CheckoutError::GuestEmailRequired)?;
            guest_email = Email::parse(raw)
                .map_err(|e| AppError::BadRequest(format!("invalid guest email: {e}")))?;
            guest_items = session
                .get(session_keys::GUEST_CART)
                .await?
                .unwrap_or_default();
            Buyer::Guest {
                items: &guest_items,
                email: &guest_email,
            }
        }
    };

    let mut tx = state.pool().begin().await?;
    let order = CheckoutService::new(&mut tx, state.config().commerce, today())
        .place_order(&buyer, &body)
        .await?;
    tx.commit().await?;

    if user.is_none() {
        session
            .remove::<Vec<GuestCartItem>>(session_keys::GUEST_CART)
            .await?;
        let mut placed: Vec<OrderId> = session
            .get(session_keys::GUEST_ORDERS)
            .await?
            .unwrap_or_default();
        placed.push(order.order.id);
        session.insert(session_keys::GUEST_ORDERS, placed).await?;
    }

    let recipient = user
        .as_ref()
        .map(|u| u.email.as_str())
        .or_else(|| order.order.guest_contact());
    if let Some(to) = recipient
        && let Err(e) = state.email().send_order_confirmation(to, &order).await
    {
        tracing::error!(
            order_number = %order.order.order_number,
            error = %e,
            "Failed to send order confirmation"
        );
    }

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders
async fn list(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Order>>> {
    let mut conn = state.pool().acquire().await?;
    let orders = OrderRepository::new(&mut conn)
        .list_for_user(user.id, page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let viewer = Viewer::load(&session, user).await?;
    let mut conn = state.pool().acquire().await?;
    let order = CheckoutService::new(&mut conn, state.config().commerce, today())
        .get(id, viewer.access())
        .await?;
    Ok(Json(order))
}

/// Cancel a pending or processing order and restock it.
///
/// POST /api/orders/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let viewer = Viewer::load(&session, user).await?;
    let mut tx = state.pool().begin().await?;
    let order = CheckoutService::new(&mut tx, state.config().commerce, today())
        .cancel(id, viewer.access())
        .await?;
    tx.commit().await?;
    Ok(Json(order))
}
