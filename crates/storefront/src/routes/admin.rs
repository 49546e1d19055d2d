//! Admin route handlers.
//!
//! Every handler takes `RequireAdmin`. Writes go through the same services
//! and repositories as the shopper routes and the assistant's admin tools.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};

use insightshop_core::{OrderId, OrderStatus, ProductId, ReturnId, ReturnStatus, SaleId};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, ReturnRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{
    NewProduct, NewSale, Order, Product, ProductFilter, ProductUpdate, ReturnRequest, Sale, User,
};
use crate::services::checkout::StatusUpdate;
use crate::services::returns::ReturnDecision;
use crate::services::{CheckoutService, OfflineGateway, ReturnService, SaleService};
use crate::state::AppState;

use super::{Pagination, today};

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/products", get(list_products).post(create_product))
        .route(
            "/api/admin/products/{id}",
            put(update_product).delete(delete_product),
        )
        .route("/api/admin/products/{id}/stock", put(update_stock))
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/orders/{id}/status", put(update_order_status))
        .route("/api/admin/returns", get(list_returns))
        .route("/api/admin/returns/{id}", put(decide_return))
        .route("/api/admin/sales", get(list_sales).post(create_sale))
        .route("/api/admin/sales/{id}", put(update_sale).delete(delete_sale))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/index/rebuild", post(rebuild_index))
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub stock_quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnListQuery {
    pub status: Option<ReturnStatus>,
}

fn product_not_found(err: RepositoryError, id: ProductId) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(format!("product {id} not found")),
        other => other.into(),
    }
}

// =============================================================================
// Products
// =============================================================================

/// GET /api/admin/products
async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    let mut conn = state.pool().acquire().await?;
    Ok(Json(ProductRepository::new(&mut conn).list(&filter).await?))
}

/// POST /api/admin/products
async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let mut conn = state.pool().acquire().await?;
    let product = ProductRepository::new(&mut conn).create(&body).await?;
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/{id}
async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    body.validate().map_err(AppError::BadRequest)?;
    let mut conn = state.pool().acquire().await?;
    let product = ProductRepository::new(&mut conn)
        .update(id, &body)
        .await
        .map_err(|e| product_not_found(e, id))?;
    Ok(Json(product))
}

/// Soft delete: the product stays for order history but leaves the catalog.
///
/// DELETE /api/admin/products/{id}
async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let mut conn = state.pool().acquire().await?;
    ProductRepository::new(&mut conn)
        .deactivate(id)
        .await
        .map_err(|e| product_not_found(e, id))?;
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/products/{id}/stock
async fn update_stock(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockRequest>,
) -> Result<Json<Product>> {
    if body.stock_quantity < 0 {
        return Err(AppError::BadRequest("stock_quantity cannot be negative".to_owned()));
    }
    let mut conn = state.pool().acquire().await?;
    let product = ProductRepository::new(&mut conn)
        .set_stock(id, body.stock_quantity)
        .await
        .map_err(|e| product_not_found(e, id))?;
    Ok(Json(product))
}

// =============================================================================
// Orders and returns
// =============================================================================

/// GET /api/admin/orders
async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>> {
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let mut conn = state.pool().acquire().await?;
    let orders = OrderRepository::new(&mut conn)
        .list_all(query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(orders))
}

/// PUT /api/admin/orders/{id}/status
async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let mut tx = state.pool().begin().await?;
    let order = CheckoutService::new(&mut tx, state.config().commerce, today())
        .update_status(id, &body)
        .await?;
    tx.commit().await?;
    tracing::info!(
        order_number = %order.order_number,
        status = %order.status,
        admin_id = %admin.id,
        "Order status updated"
    );
    Ok(Json(order))
}

/// GET /api/admin/returns
async fn list_returns(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<ReturnListQuery>,
) -> Result<Json<Vec<ReturnRequest>>> {
    let mut conn = state.pool().acquire().await?;
    Ok(Json(ReturnRepository::new(&mut conn).list_all(query.status).await?))
}

/// Move a return through its workflow; `refunded` restocks and refunds.
///
/// PUT /api/admin/returns/{id}
async fn decide_return(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ReturnId>,
    Json(body): Json<ReturnDecision>,
) -> Result<Json<ReturnRequest>> {
    let mut tx = state.pool().begin().await?;
    let updated = ReturnService::new(&mut tx, &OfflineGateway)
        .transition(id, &body)
        .await?;
    tx.commit().await?;
    Ok(Json(updated))
}

// =============================================================================
// Sales
// =============================================================================

/// GET /api/admin/sales
async fn list_sales(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Sale>>> {
    let mut conn = state.pool().acquire().await?;
    Ok(Json(SaleService::new(&mut conn).list_all().await?))
}

/// POST /api/admin/sales
async fn create_sale(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<NewSale>,
) -> Result<(StatusCode, Json<Sale>)> {
    let mut conn = state.pool().acquire().await?;
    let sale = SaleService::new(&mut conn).create(&body, today()).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// PUT /api/admin/sales/{id}
async fn update_sale(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SaleId>,
    Json(body): Json<NewSale>,
) -> Result<Json<Sale>> {
    let mut conn = state.pool().acquire().await?;
    let sale = SaleService::new(&mut conn).update(id, &body, today()).await?;
    Ok(Json(sale))
}

/// DELETE /api/admin/sales/{id}
async fn delete_sale(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<SaleId>,
) -> Result<StatusCode> {
    let mut conn = state.pool().acquire().await?;
    SaleService::new(&mut conn).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Users and index
// =============================================================================

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<User>>> {
    let mut conn = state.pool().acquire().await?;
    Ok(Json(
        UserRepository::new(&mut conn)
            .list(page.limit(), page.offset())
            .await?,
    ))
}

/// Start a vector index rebuild in the background.
///
/// POST /api/admin/index/rebuild
async fn rebuild_index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<(StatusCode, Json<Value>)> {
    let indexer = state.indexer().ok_or_else(|| {
        AppError::Conflict("semantic search is not configured".to_owned())
    })?;
    indexer.rebuild_async();
    tracing::info!(admin_id = %admin.id, "Vector index rebuild started");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "started" }))))
}
