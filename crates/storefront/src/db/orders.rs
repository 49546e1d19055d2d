//! Order and order-item repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use insightshop_core::{OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem, ShippingAddress, ShippingMethod};

const ORDER_COLUMNS: &str = "id, order_number, user_id, guest_email, shipping_name, \
    shipping_address_line1, shipping_address_line2, shipping_city, shipping_state, \
    shipping_postal_code, shipping_country, shipping_phone, shipping_method, subtotal, \
    discount_total, shipping_cost, tax, total, status, payment_status, tracking_number, \
    shipped_at, delivered_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, price, quantity, color, size";

/// Internal row type for `PostgreSQL` order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: Option<i32>,
    guest_email: Option<String>,
    shipping_name: String,
    shipping_address_line1: String,
    shipping_address_line2: Option<String>,
    shipping_city: String,
    shipping_state: String,
    shipping_postal_code: String,
    shipping_country: String,
    shipping_phone: Option<String>,
    shipping_method: String,
    subtotal: Decimal,
    discount_total: Decimal,
    shipping_cost: Decimal,
    tax: Decimal,
    total: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    tracking_number: Option<String>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let shipping_method: ShippingMethod = row
            .shipping_method
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: row.user_id.map(UserId::new),
            guest_email: row.guest_email,
            shipping_address: ShippingAddress {
                name: row.shipping_name,
                line1: row.shipping_address_line1,
                line2: row.shipping_address_line2,
                city: row.shipping_city,
                state: row.shipping_state,
                postal_code: row.shipping_postal_code,
                country: row.shipping_country,
                phone: row.shipping_phone,
            },
            shipping_method,
            subtotal: row.subtotal,
            discount_total: row.discount_total,
            shipping_cost: row.shipping_cost,
            tax: row.tax,
            total: row.total,
            status: row.status,
            payment_status: row.payment_status,
            tracking_number: row.tracking_number,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    product_name: String,
    price: Decimal,
    quantity: i32,
    color: String,
    size: String,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
            color: row.color,
            size: row.size,
        }
    }
}

/// Order header values computed at checkout.
#[derive(Debug)]
pub struct OrderDraft<'a> {
    pub order_number: &'a str,
    pub user_id: Option<UserId>,
    pub guest_email: Option<&'a str>,
    pub address: &'a ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Repository for order database operations.
pub struct OrderRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> OrderRepository<'c> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert an order header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is already taken.
    pub async fn create(&mut self, draft: &OrderDraft<'_>) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO insightshop.order (
                order_number, user_id, guest_email, shipping_name, shipping_address_line1,
                shipping_address_line2, shipping_city, shipping_state, shipping_postal_code,
                shipping_country, shipping_phone, shipping_method, subtotal, discount_total,
                shipping_cost, tax, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(draft.order_number)
        .bind(draft.user_id)
        .bind(draft.guest_email)
        .bind(draft.address.name.trim())
        .bind(draft.address.line1.trim())
        .bind(draft.address.line2.as_deref())
        .bind(draft.address.city.trim())
        .bind(draft.address.state.trim())
        .bind(draft.address.postal_code.trim())
        .bind(draft.address.country.trim())
        .bind(draft.address.phone.as_deref())
        .bind(draft.shipping_method.as_str())
        .bind(draft.subtotal)
        .bind(draft.discount_total)
        .bind(draft.shipping_cost)
        .bind(draft.tax)
        .bind(draft.total)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "order number already exists"))?;

        row.try_into()
    }

    /// Insert an order line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_item(
        &mut self,
        order_id: OrderId,
        product_id: ProductId,
        product_name: &str,
        price: Decimal,
        quantity: i32,
        color: &str,
        size: &str,
    ) -> Result<OrderItem, RepositoryError> {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!(
            r"
            INSERT INTO insightshop.order_item
                (order_id, product_id, product_name, price, quantity, color, size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(product_id)
        .bind(product_name)
        .bind(price)
        .bind(quantity)
        .bind(color)
        .bind(size)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM insightshop.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an order by ID and lock it for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_update(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM insightshop.order WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an order by its customer-facing number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&mut self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM insightshop.order WHERE order_number = $1"
        ))
        .bind(number.trim().to_ascii_uppercase())
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &mut self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM insightshop.order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// All orders, optionally by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &mut self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM insightshop.order
            WHERE $1::insightshop.order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM insightshop.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A single order line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM insightshop.order_item WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Move an order to `status`, stamping `shipped_at`/`delivered_at` and
    /// storing the tracking number when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn update_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE insightshop.order SET
                status = $2,
                tracking_number = COALESCE($3, tracking_number),
                shipped_at = CASE WHEN $2 = 'shipped' THEN NOW() ELSE shipped_at END,
                delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(tracking_number)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Record the order's payment state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_payment_status(
        &mut self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE insightshop.order SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Whether the user has a delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_purchase(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM insightshop.order o
                JOIN insightshop.order_item i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = 'delivered'
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(found)
    }
}
