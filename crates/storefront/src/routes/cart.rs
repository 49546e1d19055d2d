//! Cart route handlers.
//!
//! Logged-in users get their saved cart; guests get a cart kept in the
//! session under `guest_cart`. Both go through `CartService`, so the rules
//! (variant merge, stock check, quantity cap) are the same.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::models::{CartView, CurrentUser, GuestCartItem, session_keys};
use crate::services::{AddToCart, CartOwner, CartService};
use crate::state::AppState;

use super::today;

/// Build the cart router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/cart", get(show).post(add).delete(clear))
        .route("/api/cart/{line}", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct AddResponse {
    /// Quantity of the affected line after the add.
    pub line_quantity: i32,
    pub cart: CartView,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// The cart belonging to this request.
pub(super) async fn cart_owner(session: &Session, user: Option<&CurrentUser>) -> Result<CartOwner> {
    Ok(match user {
        Some(user) => CartOwner::User(user.id),
        None => CartOwner::Guest(
            session
                .get::<Vec<GuestCartItem>>(session_keys::GUEST_CART)
                .await?
                .unwrap_or_default(),
        ),
    })
}

/// Write a guest cart back to the session. Saved carts are already stored.
pub(super) async fn save_guest_cart(session: &Session, owner: &CartOwner) -> Result<()> {
    if let CartOwner::Guest(items) = owner {
        session.insert(session_keys::GUEST_CART, items).await?;
    }
    Ok(())
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /api/cart
async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Json<CartView>> {
    let owner = cart_owner(&session, user.as_ref()).await?;
    let mut conn = state.pool().acquire().await?;
    let cart = CartService::new(&mut conn, today()).view(&owner).await?;
    Ok(Json(cart))
}

/// POST /api/cart
async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<AddToCart>,
) -> Result<Json<AddResponse>> {
    let mut owner = cart_owner(&session, user.as_ref()).await?;
    let mut tx = state.pool().begin().await?;
    let mut carts = CartService::new(&mut tx, today());
    let line_quantity = carts.add(&mut owner, &body).await?;
    let cart = carts.view(&owner).await?;
    tx.commit().await?;
    save_guest_cart(&session, &owner).await?;
    Ok(Json(AddResponse {
        line_quantity,
        cart,
    }))
}

/// PUT /api/cart/{line}
async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(line): Path<i32>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartView>> {
    let mut owner = cart_owner(&session, user.as_ref()).await?;
    let mut tx = state.pool().begin().await?;
    let mut carts = CartService::new(&mut tx, today());
    carts.update_quantity(&mut owner, line, body.quantity).await?;
    let cart = carts.view(&owner).await?;
    tx.commit().await?;
    save_guest_cart(&session, &owner).await?;
    Ok(Json(cart))
}

/// DELETE /api/cart/{line}
async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(line): Path<i32>,
) -> Result<Json<CartView>> {
    let mut owner = cart_owner(&session, user.as_ref()).await?;
    let mut conn = state.pool().acquire().await?;
    let mut carts = CartService::new(&mut conn, today());
    carts.remove(&mut owner, line).await?;
    let cart = carts.view(&owner).await?;
    save_guest_cart(&session, &owner).await?;
    Ok(Json(cart))
}

/// DELETE /api/cart
async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
) -> Result<Json<CartView>> {
    let mut owner = cart_owner(&session, user.as_ref()).await?;
    let mut conn = state.pool().acquire().await?;
    let mut carts = CartService::new(&mut conn, today());
    carts.clear(&mut owner).await?;
    let cart = carts.view(&owner).await?;
    save_guest_cart(&session, &owner).await?;
    Ok(Json(cart))
}
