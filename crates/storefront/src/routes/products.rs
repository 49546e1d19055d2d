//! Catalog route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Serialize;

use insightshop_core::ProductId;

use crate::assistant::ProductCard;
use crate::assistant::matching::{MatchSuggestion, recommend_matches};
use crate::db::{ProductRepository, SaleRepository};
use crate::error::{AppError, Result};
use crate::models::{Product, ProductFilter};
use crate::state::AppState;

use super::today;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(index))
        .route("/api/products/{id}", get(show))
        .route("/api/products/{id}/matches", get(matches))
}

/// One page of the catalog.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductCard>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Product detail: the card plus attributes the listing leaves out.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub card: ProductCard,
    pub stock_quantity: i32,
    pub size: Option<String>,
    pub fabric: Option<String>,
    pub occasion: Option<String>,
    pub age_group: Option<String>,
    pub dress_style: Option<String>,
}

impl ProductDetail {
    fn new(product: &Product, card: ProductCard) -> Self {
        Self {
            card,
            stock_quantity: product.stock_quantity,
            size: product.size.clone(),
            fabric: product.fabric.clone(),
            occasion: product.occasion.clone(),
            age_group: product.age_group.clone(),
            dress_style: product.dress_style.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub product_id: ProductId,
    pub suggestions: Vec<MatchSuggestion>,
}

/// GET /api/products
async fn index(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ProductPage>> {
    let today = today();
    let mut conn = state.pool().acquire().await?;
    let mut products = ProductRepository::new(&mut conn);
    let page = products.list(&filter).await?;
    let total = products.count(&filter).await?;
    let sales = SaleRepository::new(&mut conn).list_active(today).await?;

    Ok(Json(ProductPage {
        products: page
            .iter()
            .map(|p| ProductCard::new(p, &sales, today))
            .collect(),
        total,
        limit: filter.effective_limit(),
        offset: filter.effective_offset(),
    }))
}

/// GET /api/products/{id}
async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let today = today();
    let mut conn = state.pool().acquire().await?;
    let product = active_product(&mut conn, id).await?;
    let sales = SaleRepository::new(&mut conn).list_active(today).await?;
    let card = ProductCard::new(&product, &sales, today);
    Ok(Json(ProductDetail::new(&product, card)))
}

/// GET /api/products/{id}/matches
async fn matches(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<MatchesResponse>> {
    let mut conn = state.pool().acquire().await?;
    let product = active_product(&mut conn, id).await?;
    let suggestions = recommend_matches(&mut conn, &product, today()).await?;
    Ok(Json(MatchesResponse {
        product_id: product.id,
        suggestions,
    }))
}

pub(super) async fn active_product(
    conn: &mut sqlx::PgConnection,
    id: ProductId,
) -> Result<Product> {
    ProductRepository::new(conn)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::product::fixtures::product;

    #[test]
    fn test_detail_flattens_card() {
        let mut p = product(3, "Wrap Dress", "dress", "red");
        p.fabric = Some("silk".to_owned());
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let detail = ProductDetail::new(&p, ProductCard::new(&p, &[], today));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Wrap Dress");
        assert_eq!(json["fabric"], "silk");
        assert!(json.get("card").is_none());
    }
}
