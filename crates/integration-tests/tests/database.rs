//! Integration tests for the transactional core against `PostgreSQL`.
//!
//! Each test gets a fresh database with the storefront migrations applied.
//! The server needs the `vector` extension installed.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test -p insightshop-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::{PgConnection, PgPool};

use insightshop_core::{CallerRole, Email, OrderId, OrderStatus, PaymentMethod, ProductId, ReturnStatus, UserId};
use insightshop_storefront::assistant::{ToolContext, ToolExecutor, ToolRegistry};
use insightshop_storefront::config::CommerceConfig;
use insightshop_storefront::db::{CartRepository, ProductRepository, UserRepository};
use insightshop_storefront::models::{NewProduct, NewReturn, ShippingAddress, ShippingMethod};
use insightshop_storefront::services::checkout::StatusUpdate;
use insightshop_storefront::services::returns::ReturnDecision;
use insightshop_storefront::services::{
    Buyer, CheckoutError, CheckoutRequest, CheckoutService, OfflineGateway, OrderAccess,
    PaymentService, ReturnService,
};

// =============================================================================
// Fixtures
// =============================================================================

async fn create_product(conn: &mut PgConnection, name: &str, price: i64, stock: i32) -> ProductId {
    let input = NewProduct {
        name: name.to_owned(),
        description: String::new(),
        price: Decimal::new(price, 0),
        original_price: None,
        category: "women".to_owned(),
        clothing_type: Some("dress".to_owned()),
        color: Some("navy".to_owned()),
        size: None,
        fabric: None,
        occasion: None,
        age_group: None,
        dress_style: None,
        available_colors: Vec::new(),
        available_sizes: Vec::new(),
        stock_quantity: stock,
        image_url: None,
    };
    ProductRepository::new(conn).create(&input).await.unwrap().id
}

async fn create_user(conn: &mut PgConnection, email: &str) -> UserId {
    let email = Email::parse(email).unwrap();
    UserRepository::new(conn)
        .create(&email, "not-a-real-hash", Some("Ada"), None)
        .await
        .unwrap()
        .id
}

async fn stock_of(conn: &mut PgConnection, id: ProductId) -> i32 {
    ProductRepository::new(conn)
        .get_any(id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: ShippingAddress {
            name: "Ada Lovelace".to_owned(),
            line1: "12 Market St".to_owned(),
            line2: None,
            city: "Springfield".to_owned(),
            state: "IL".to_owned(),
            postal_code: "62701".to_owned(),
            country: "US".to_owned(),
            phone: None,
        },
        shipping_method: ShippingMethod::Standard,
        guest_email: None,
    }
}

/// Put `quantity` of `product_id` in the user's cart and check out.
async fn place_order(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
) -> Result<OrderId, CheckoutError> {
    CartRepository::new(&mut *conn)
        .upsert(user_id, product_id, quantity, "", "")
        .await
        .unwrap();
    let placed = CheckoutService::new(conn, CommerceConfig::default(), Utc::now().date_naive())
        .place_order(&Buyer::User(user_id), &checkout_request())
        .await?;
    Ok(placed.order.id)
}

async fn execute(pool: &PgPool, ctx: &ToolContext, tool: &str, args: Value) -> Value {
    let registry = ToolRegistry::builtin().unwrap();
    ToolExecutor::new(pool, &registry, CommerceConfig::default())
        .execute(tool, &args, ctx)
        .await
        .unwrap()
}

// =============================================================================
// Tool executor transactions
// =============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL with pgvector (DATABASE_URL)"]
async fn test_failed_tool_call_rolls_back_partial_writes(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let product_id = create_product(&mut conn, "Wrap Dress", 80, 10).await;
    let user_id = create_user(&mut conn, "ada@example.com").await;
    let order_id = place_order(&mut conn, user_id, product_id, 3).await.unwrap();
    assert_eq!(stock_of(&mut conn, product_id).await, 7);

    // Cancelling restocks first and then updates the order row. Make the
    // second write fail so the restock has to be undone.
    sqlx::query(
        r"
        CREATE FUNCTION insightshop.freeze_cancellations() RETURNS trigger AS $$
        BEGIN
            IF NEW.status = 'cancelled' THEN
                RAISE EXCEPTION 'cancellations are frozen';
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        ",
    )
    .execute(&mut *conn)
    .await
    .unwrap();
    sqlx::query(
        r"
        CREATE TRIGGER freeze_cancellations BEFORE UPDATE ON insightshop.order
        FOR EACH ROW EXECUTE FUNCTION insightshop.freeze_cancellations()
        ",
    )
    .execute(&mut *conn)
    .await
    .unwrap();

    let admin = ToolContext::new(CallerRole::Admin, Some(user_id), Utc::now());
    let args = json!({"order_id": order_id, "status": "cancelled"});
    let result = execute(&pool, &admin, "admin_order_update_status", args.clone()).await;
    assert_eq!(result["success"], false);
    assert_eq!(stock_of(&mut conn, product_id).await, 7);

    sqlx::query("DROP TRIGGER freeze_cancellations ON insightshop.order")
        .execute(&mut *conn)
        .await
        .unwrap();

    let result = execute(&pool, &admin, "admin_order_update_status", args).await;
    assert_eq!(result["success"], true, "{result}");
    assert_eq!(result["status"], "cancelled");
    assert_eq!(stock_of(&mut conn, product_id).await, 10);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL with pgvector (DATABASE_URL)"]
async fn test_cart_add_merges_caps_and_checks_stock(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let plenty = create_product(&mut conn, "Linen Shirt", 45, 500).await;
    let scarce = create_product(&mut conn, "Silk Scarf", 30, 5).await;
    let user_id = create_user(&mut conn, "grace@example.com").await;
    let shopper = ToolContext::new(CallerRole::User, Some(user_id), Utc::now());

    let result = execute(&pool, &shopper, "cart_add_item", json!({"product_id": plenty, "quantity": 60})).await;
    assert_eq!(result["line_quantity"], 60);

    // Whole-number floats are accepted for integer arguments.
    let result = execute(&pool, &shopper, "cart_add_item", json!({"product_id": plenty, "quantity": 60.0})).await;
    assert_eq!(result["success"], true, "{result}");
    assert_eq!(result["line_quantity"], 99);

    let result = execute(&pool, &shopper, "cart_add_item", json!({"product_id": scarce, "quantity": 6})).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["message"], "only 5 of Silk Scarf in stock");

    let lines = CartRepository::new(&mut conn).list(user_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, plenty);
    assert_eq!(lines[0].quantity, 99);
}

// =============================================================================
// Checkout and order lifecycle
// =============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL with pgvector (DATABASE_URL)"]
async fn test_place_order_rejects_insufficient_stock(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    let product_id = create_product(&mut tx, "Maxi Dress", 120, 2).await;
    let user_id = create_user(&mut tx, "linus@example.com").await;

    let err = place_order(&mut tx, user_id, product_id, 3).await.unwrap_err();
    assert!(
        matches!(err, CheckoutError::InsufficientStock { available: 2, ref name } if name == "Maxi Dress"),
        "{err:?}"
    );
    tx.rollback().await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(stock_of(&mut conn, product_id).await, 2);
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insightshop.order")
        .fetch_one(&mut *conn)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL with pgvector (DATABASE_URL)"]
async fn test_place_order_decrements_stock_and_cancel_restores_it(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let product_id = create_product(&mut conn, "Bomber Jacket", 90, 10).await;
    let user_id = create_user(&mut conn, "margaret@example.com").await;

    let order_id = place_order(&mut conn, user_id, product_id, 4).await.unwrap();
    assert_eq!(stock_of(&mut conn, product_id).await, 6);
    assert!(CartRepository::new(&mut conn).list(user_id).await.unwrap().is_empty());

    let mut orders = CheckoutService::new(&mut conn, CommerceConfig::default(), Utc::now().date_naive());
    let order = orders.cancel(order_id, OrderAccess::User(user_id)).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let err = orders.cancel(order_id, OrderAccess::User(user_id)).await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotCancellable(OrderStatus::Cancelled)));
    assert_eq!(stock_of(&mut conn, product_id).await, 10);
}

// =============================================================================
// Payments and returns
// =============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL with pgvector (DATABASE_URL)"]
async fn test_return_refund_restocks_and_partial_refunds_add_up(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let product_id = create_product(&mut conn, "Chino Pants", 50, 10).await;
    let user_id = create_user(&mut conn, "barbara@example.com").await;
    let order_id = place_order(&mut conn, user_id, product_id, 2).await.unwrap();

    let payment = PaymentService::new(&mut conn, &OfflineGateway)
        .pay(order_id, PaymentMethod::CashOnDelivery, OrderAccess::User(user_id))
        .await
        .unwrap();

    let mut orders = CheckoutService::new(&mut conn, CommerceConfig::default(), Utc::now().date_naive());
    for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
        orders
            .update_status(order_id, &StatusUpdate { status, tracking_number: None, carrier: None })
            .await
            .unwrap();
    }
    let placed = orders.get(order_id, OrderAccess::User(user_id)).await.unwrap();
    let item = placed.items.first().unwrap();
    assert_eq!(stock_of(&mut conn, product_id).await, 8);

    let mut returns = ReturnService::new(&mut conn, &OfflineGateway);
    let request = returns
        .request(
            user_id,
            &NewReturn {
                order_id,
                order_item_id: item.id,
                quantity: 1,
                reason: "Too long".to_owned(),
            },
            Utc::now(),
        )
        .await
        .unwrap();
    for status in [ReturnStatus::Approved, ReturnStatus::Received, ReturnStatus::Refunded] {
        returns
            .transition(request.id, &ReturnDecision { status, admin_notes: None })
            .await
            .unwrap();
    }
    assert_eq!(stock_of(&mut conn, product_id).await, 9);

    // One of two items refunded: the payment is still settled. Refunding
    // the rest of the payment completes it.
    let mut payments = PaymentService::new(&mut conn, &OfflineGateway);
    let remainder = payment.amount - request.refund_amount;
    let outcome = payments.refund(order_id, remainder, "goodwill").await.unwrap();
    assert!(outcome.fully_refunded);

    let status: String =
        sqlx::query_scalar("SELECT payment_status::text FROM insightshop.order WHERE id = $1")
            .bind(order_id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
    assert_eq!(status, "refunded");
}
