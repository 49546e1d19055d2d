//! One handler per catalog tool.
//!
//! Arguments have already passed schema validation; handlers deserialize them
//! into typed structs and call the same services the HTTP routes use.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sqlx::PgConnection;

use insightshop_core::{OrderId, ProductId, ReviewId, UserId};

use crate::assistant::ProductCard;
use crate::assistant::matching::recommend_matches;
use crate::config::CommerceConfig;
use crate::db::{OrderRepository, ProductRepository, RepositoryError, SaleRepository};
use crate::models::{NewProduct, NewSale, Product, ProductFilter, ProductUpdate, ReviewInput};
use crate::services::checkout::StatusUpdate;
use crate::services::{
    AddToCart, CartOwner, CartService, CheckoutService, OfflineGateway, OrderAccess,
    ReturnService, ReviewService, SaleService,
};

use super::{ToolContext, ToolError};

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const DEFAULT_LIST_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: Option<String>,
    category: Option<String>,
    color: Option<String>,
    clothing_type: Option<String>,
    occasion: Option<String>,
    age_group: Option<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProductArgs {
    product_id: ProductId,
}

#[derive(Debug, Deserialize)]
struct ReviewListArgs {
    product_id: ProductId,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CartLineArgs {
    cart_item_id: i32,
    #[serde(default)]
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct LimitArgs {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OrderNumberArgs {
    order_number: String,
}

#[derive(Debug, Deserialize)]
struct OrderArgs {
    order_id: OrderId,
}

#[derive(Debug, Deserialize)]
struct ReviewCreateArgs {
    product_id: ProductId,
    #[serde(flatten)]
    review: ReviewInput,
}

#[derive(Debug, Deserialize)]
struct ProductUpdateArgs {
    product_id: ProductId,
    #[serde(flatten)]
    update: ProductUpdate,
}

#[derive(Debug, Deserialize)]
struct StockArgs {
    product_id: ProductId,
    stock_quantity: i32,
}

#[derive(Debug, Deserialize)]
struct OrderStatusArgs {
    order_id: OrderId,
    #[serde(flatten)]
    update: StatusUpdate,
}

#[derive(Debug, Deserialize)]
struct ReviewArgs {
    review_id: ReviewId,
}

fn parse<T: DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(args.clone())?)
}

/// One tool call inside a transaction.
pub(super) struct ToolRun<'c> {
    conn: &'c mut PgConnection,
    ctx: &'c ToolContext,
    commerce: CommerceConfig,
}

impl<'c> ToolRun<'c> {
    pub(super) const fn new(
        conn: &'c mut PgConnection,
        ctx: &'c ToolContext,
        commerce: CommerceConfig,
    ) -> Self {
        Self {
            conn,
            ctx,
            commerce,
        }
    }

    pub(super) async fn dispatch(mut self, name: &str, args: &Value) -> Result<Value, ToolError> {
        match name {
            // Public
            "product_search" => self.product_search(parse(args)?).await,
            "product_get" => self.product_get(parse(args)?).await,
            "product_recommend_matches" => self.product_recommend_matches(parse(args)?).await,
            "sale_list_active" => self.sale_list_active().await,
            "review_list" => self.review_list(parse(args)?).await,

            // Signed-in shoppers
            "cart_view" => self.cart_view().await,
            "cart_add_item" => self.cart_add_item(parse(args)?).await,
            "cart_update_quantity" => self.cart_update_quantity(parse(args)?).await,
            "cart_remove_item" => self.cart_remove_item(parse(args)?).await,
            "order_list" => self.order_list(parse(args)?).await,
            "order_status" => self.order_status(parse(args)?).await,
            "return_check_eligibility" => self.return_check_eligibility(parse(args)?).await,
            "review_create" => self.review_create(parse(args)?).await,

            // Administrators
            "admin_product_create" => self.admin_product_create(parse(args)?).await,
            "admin_product_update" => self.admin_product_update(parse(args)?).await,
            "admin_product_delete" => self.admin_product_delete(parse(args)?).await,
            "admin_stock_update" => self.admin_stock_update(parse(args)?).await,
            "admin_order_update_status" => self.admin_order_update_status(parse(args)?).await,
            "admin_sale_create" => self.admin_sale_create(parse(args)?).await,
            "admin_review_delete" => self.admin_review_delete(parse(args)?).await,

            other => Err(ToolError::NotFound(format!("tool {other}"))),
        }
    }

    fn user_id(&self) -> Result<UserId, ToolError> {
        self.ctx.user_id.ok_or(ToolError::LoginRequired)
    }

    async fn cards(&mut self, products: &[Product]) -> Result<Vec<ProductCard>, ToolError> {
        let sales = SaleRepository::new(&mut *self.conn)
            .list_active(self.ctx.today)
            .await?;
        Ok(products
            .iter()
            .map(|p| ProductCard::new(p, &sales, self.ctx.today))
            .collect())
    }

    async fn active_product(&mut self, id: ProductId) -> Result<Product, ToolError> {
        ProductRepository::new(&mut *self.conn)
            .get(id)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("product {id}")))
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    async fn product_search(&mut self, args: SearchArgs) -> Result<Value, ToolError> {
        let filter = ProductFilter {
            query: args.query,
            category: args.category,
            color: args.color,
            clothing_type: args.clothing_type,
            occasion: args.occasion,
            age_group: args.age_group,
            min_price: args.min_price,
            max_price: args.max_price,
            limit: Some(args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)),
            ..ProductFilter::default()
        };
        let products = ProductRepository::new(&mut *self.conn).list(&filter).await?;
        let cards = self.cards(&products).await?;
        Ok(json!({ "count": cards.len(), "products": cards }))
    }

    async fn product_get(&mut self, args: ProductArgs) -> Result<Value, ToolError> {
        let product = self.active_product(args.product_id).await?;
        let card = self.cards(std::slice::from_ref(&product)).await?;
        Ok(json!({
            "product": card.first(),
            "stock_quantity": product.stock_quantity,
            "fabric": product.fabric,
            "occasion": product.occasion,
            "age_group": product.age_group,
            "dress_style": product.dress_style,
        }))
    }

    async fn product_recommend_matches(&mut self, args: ProductArgs) -> Result<Value, ToolError> {
        let product = self.active_product(args.product_id).await?;
        let suggestions = recommend_matches(&mut *self.conn, &product, self.ctx.today).await?;
        Ok(json!({ "product_id": product.id, "suggestions": suggestions }))
    }

    async fn sale_list_active(&mut self) -> Result<Value, ToolError> {
        let sales = SaleService::new(&mut *self.conn)
            .active(self.ctx.today)
            .await?;
        Ok(json!({ "sales": sales }))
    }

    async fn review_list(&mut self, args: ReviewListArgs) -> Result<Value, ToolError> {
        let reviews = ReviewService::new(&mut *self.conn)
            .list(
                args.product_id,
                args.limit.unwrap_or(DEFAULT_LIST_LIMIT),
                0,
            )
            .await?;
        Ok(json!({ "product_id": args.product_id, "reviews": reviews }))
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    async fn cart_view(&mut self) -> Result<Value, ToolError> {
        let owner = CartOwner::User(self.user_id()?);
        let cart = CartService::new(&mut *self.conn, self.ctx.today)
            .view(&owner)
            .await?;
        Ok(json!({ "cart": cart }))
    }

    async fn cart_add_item(&mut self, args: AddToCart) -> Result<Value, ToolError> {
        let mut owner = CartOwner::User(self.user_id()?);
        let mut carts = CartService::new(&mut *self.conn, self.ctx.today);
        let line_quantity = carts.add(&mut owner, &args).await?;
        let cart = carts.view(&owner).await?;
        Ok(json!({
            "message": format!("Added {} to the cart", args.quantity),
            "line_quantity": line_quantity,
            "cart": cart,
        }))
    }

    async fn cart_update_quantity(&mut self, args: CartLineArgs) -> Result<Value, ToolError> {
        let mut owner = CartOwner::User(self.user_id()?);
        let mut carts = CartService::new(&mut *self.conn, self.ctx.today);
        carts
            .update_quantity(&mut owner, args.cart_item_id, args.quantity)
            .await?;
        let cart = carts.view(&owner).await?;
        Ok(json!({ "cart": cart }))
    }

    async fn cart_remove_item(&mut self, args: CartLineArgs) -> Result<Value, ToolError> {
        let mut owner = CartOwner::User(self.user_id()?);
        let mut carts = CartService::new(&mut *self.conn, self.ctx.today);
        carts.remove(&mut owner, args.cart_item_id).await?;
        let cart = carts.view(&owner).await?;
        Ok(json!({ "cart": cart }))
    }

    // -------------------------------------------------------------------------
    // Orders and returns
    // -------------------------------------------------------------------------

    async fn order_list(&mut self, args: LimitArgs) -> Result<Value, ToolError> {
        let user_id = self.user_id()?;
        let orders = OrderRepository::new(&mut *self.conn)
            .list_for_user(user_id, args.limit.unwrap_or(DEFAULT_LIST_LIMIT), 0)
            .await?;
        let summaries: Vec<Value> = orders
            .iter()
            .map(|o| {
                json!({
                    "order_id": o.id,
                    "order_number": o.order_number,
                    "status": o.status,
                    "payment_status": o.payment_status,
                    "total": o.total,
                    "created_at": o.created_at,
                })
            })
            .collect();
        Ok(json!({ "count": summaries.len(), "orders": summaries }))
    }

    async fn order_status(&mut self, args: OrderNumberArgs) -> Result<Value, ToolError> {
        let user_id = self.user_id()?;
        let (order, shipments) = CheckoutService::new(&mut *self.conn, self.commerce, self.ctx.today)
            .track(args.order_number.trim(), OrderAccess::User(user_id))
            .await?;
        Ok(json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "status": order.status,
            "payment_status": order.payment_status,
            "tracking_number": order.tracking_number,
            "shipped_at": order.shipped_at,
            "delivered_at": order.delivered_at,
            "shipments": shipments,
        }))
    }

    async fn return_check_eligibility(&mut self, args: OrderArgs) -> Result<Value, ToolError> {
        let user_id = self.user_id()?;
        let eligibility = ReturnService::new(&mut *self.conn, &OfflineGateway)
            .check(args.order_id, user_id, self.ctx.now)
            .await?;
        Ok(json!({ "order_id": args.order_id, "eligibility": eligibility }))
    }

    async fn review_create(&mut self, args: ReviewCreateArgs) -> Result<Value, ToolError> {
        let user_id = self.user_id()?;
        let review = ReviewService::new(&mut *self.conn)
            .create(user_id, args.product_id, &args.review)
            .await?;
        Ok(json!({ "review": review }))
    }

    // -------------------------------------------------------------------------
    // Admin
    // -------------------------------------------------------------------------

    async fn admin_product_create(&mut self, input: NewProduct) -> Result<Value, ToolError> {
        input.validate().map_err(ToolError::Invalid)?;
        let product = ProductRepository::new(&mut *self.conn).create(&input).await?;
        tracing::info!(product_id = %product.id, "Product created by assistant");
        Ok(json!({ "product": product }))
    }

    async fn admin_product_update(&mut self, args: ProductUpdateArgs) -> Result<Value, ToolError> {
        args.update.validate().map_err(ToolError::Invalid)?;
        let product = ProductRepository::new(&mut *self.conn)
            .update(args.product_id, &args.update)
            .await
            .map_err(|e| product_not_found(e, args.product_id))?;
        Ok(json!({ "product": product }))
    }

    async fn admin_product_delete(&mut self, args: ProductArgs) -> Result<Value, ToolError> {
        ProductRepository::new(&mut *self.conn)
            .deactivate(args.product_id)
            .await
            .map_err(|e| product_not_found(e, args.product_id))?;
        Ok(json!({ "product_id": args.product_id, "is_active": false }))
    }

    async fn admin_stock_update(&mut self, args: StockArgs) -> Result<Value, ToolError> {
        if args.stock_quantity < 0 {
            return Err(ToolError::Invalid("stock_quantity cannot be negative".to_owned()));
        }
        let product = ProductRepository::new(&mut *self.conn)
            .set_stock(args.product_id, args.stock_quantity)
            .await
            .map_err(|e| product_not_found(e, args.product_id))?;
        Ok(json!({
            "product_id": product.id,
            "stock_quantity": product.stock_quantity,
        }))
    }

    async fn admin_order_update_status(&mut self, args: OrderStatusArgs) -> Result<Value, ToolError> {
        let order = CheckoutService::new(&mut *self.conn, self.commerce, self.ctx.today)
            .update_status(args.order_id, &args.update)
            .await?;
        Ok(json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "status": order.status,
            "tracking_number": order.tracking_number,
        }))
    }

    async fn admin_sale_create(&mut self, input: NewSale) -> Result<Value, ToolError> {
        let sale = SaleService::new(&mut *self.conn)
            .create(&input, self.ctx.today)
            .await?;
        Ok(json!({ "sale": sale }))
    }

    async fn admin_review_delete(&mut self, args: ReviewArgs) -> Result<Value, ToolError> {
        let product_id = ReviewService::new(&mut *self.conn)
            .delete(args.review_id, None)
            .await?;
        Ok(json!({ "review_id": args.review_id, "product_id": product_id }))
    }
}

fn product_not_found(err: RepositoryError, id: ProductId) -> ToolError {
    match err {
        RepositoryError::NotFound => ToolError::NotFound(format!("product {id}")),
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insightshop_core::OrderStatus;

    use super::*;

    #[test]
    fn test_search_args_accept_numbers_for_prices() {
        let args: SearchArgs =
            parse(&json!({"color": "red", "max_price": 49.99, "limit": 5})).unwrap();
        assert_eq!(args.max_price, Some(Decimal::new(4999, 2)));
        assert_eq!(args.limit, Some(5));
        assert!(args.query.is_none());
    }

    #[test]
    fn test_review_args_flatten_input() {
        let args: ReviewCreateArgs = parse(&json!({
            "product_id": 3,
            "rating": 4,
            "comment": "Runs small"
        }))
        .unwrap();
        assert_eq!(args.product_id, ProductId::new(3));
        assert_eq!(args.review.rating, 4);
        assert!(args.review.title.is_none());
    }

    #[test]
    fn test_order_status_args() {
        let args: OrderStatusArgs = parse(&json!({
            "order_id": 9,
            "status": "shipped",
            "tracking_number": "1Z999"
        }))
        .unwrap();
        assert_eq!(args.update.status, OrderStatus::Shipped);
        assert_eq!(args.update.tracking_number.as_deref(), Some("1Z999"));
    }

    #[test]
    fn test_sale_args_parse_dates() {
        let sale: NewSale = parse(&json!({
            "name": "Flash Friday",
            "sale_type": "flash",
            "discount_percentage": 25,
            "start_date": "2025-11-28",
            "end_date": "2025-11-28",
            "product_filter": {"categories": ["women"]}
        }))
        .unwrap();
        assert!(sale.validate().is_ok());
        assert_eq!(
            sale.product_filter.categories,
            Some(vec!["women".to_owned()])
        );
    }

    #[test]
    fn test_parse_reports_type_errors() {
        let err = parse::<ProductArgs>(&json!({"product_id": "seven"})).unwrap_err();
        assert!(matches!(err, ToolError::Arguments(_)));
    }

    #[test]
    fn test_validated_whole_floats_parse_as_ids() {
        let registry = crate::assistant::tools::ToolRegistry::builtin().unwrap();
        let mut args = json!({"product_id": 3.0});
        let tool = registry
            .validate_tool_call("product_get", &args, insightshop_core::CallerRole::Guest)
            .unwrap();
        tool.schema.normalize_integers(&mut args);
        let parsed: ProductArgs = parse(&args).unwrap();
        assert_eq!(parsed.product_id, ProductId::new(3));

        let mut args = json!({"product_id": 2.0, "quantity": 4.0});
        let tool = registry
            .validate_tool_call("cart_add_item", &args, insightshop_core::CallerRole::User)
            .unwrap();
        tool.schema.normalize_integers(&mut args);
        let parsed: AddToCart = parse(&args).unwrap();
        assert_eq!(parsed.quantity, 4);
    }

    #[test]
    fn test_product_not_found_mapping() {
        let err = product_not_found(RepositoryError::NotFound, ProductId::new(12));
        assert_eq!(err.to_string(), "product 12 not found");
    }
}
