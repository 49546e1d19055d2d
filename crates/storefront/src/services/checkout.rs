//! Checkout and order lifecycle.
//!
//! Orders are created inside the caller's transaction: product rows are locked
//! `FOR UPDATE`, stock is checked and decremented, and prices are snapshotted
//! after sale discounts. Confirmation emails are sent by the caller once the
//! transaction has committed.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{Email, OrderId, OrderStatus, ProductId, UserId};

use crate::config::CommerceConfig;
use crate::db::{
    CartRepository, OrderDraft, OrderRepository, ProductRepository, RepositoryError,
    SaleRepository, Shipment, ShipmentRepository,
};
use crate::models::{GuestCartItem, Order, OrderWithItems, Product, ShippingAddress, ShippingMethod};

use super::pricing::{OrderTotals, price_product};

/// Carrier recorded when an admin ships an order without naming one.
pub const DEFAULT_CARRIER: &str = "InsightShop Delivery";

/// Errors from checkout and order management.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("cart is empty")]
    EmptyCart,

    #[error("{0}")]
    InvalidAddress(String),

    #[error("an email address is required for guest checkout")]
    GuestEmailRequired,

    #[error("{0} is no longer available")]
    ProductUnavailable(String),

    #[error("only {available} of {name} in stock")]
    InsufficientStock { name: String, available: i32 },

    #[error("order not found")]
    OrderNotFound,

    #[error("orders that are {0} cannot be cancelled")]
    NotCancellable(OrderStatus),

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// Who may see or act on an order.
#[derive(Debug, Clone, Copy)]
pub enum OrderAccess<'a> {
    Admin,
    User(UserId),
    /// Orders placed by this browser session while logged out.
    Guest(&'a [OrderId]),
}

impl OrderAccess<'_> {
    #[must_use]
    pub fn permits(&self, order: &Order) -> bool {
        match self {
            Self::Admin => true,
            Self::User(user_id) => order.is_owned_by(*user_id),
            Self::Guest(ids) => order.user_id.is_none() && ids.contains(&order.id),
        }
    }
}

/// Who is checking out.
#[derive(Debug)]
pub enum Buyer<'a> {
    User(UserId),
    Guest {
        items: &'a [GuestCartItem],
        email: &'a Email,
    },
}

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    /// Required when checking out without an account.
    #[serde(default)]
    pub guest_email: Option<String>,
}

/// Admin status change.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
}

/// One line to be ordered, before pricing.
struct PendingLine {
    product_id: ProductId,
    quantity: i32,
    color: String,
    size: String,
}

/// Checkout and order service over one connection (normally a transaction).
pub struct CheckoutService<'c> {
    conn: &'c mut PgConnection,
    commerce: CommerceConfig,
    today: NaiveDate,
}

impl<'c> CheckoutService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection, commerce: CommerceConfig, today: NaiveDate) -> Self {
        Self {
            conn,
            commerce,
            today,
        }
    }

    /// Turn the buyer's cart into an order.
    ///
    /// The saved cart of a user is cleared; a guest caller clears the session
    /// cart after commit.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart`, `CheckoutError::InvalidAddress`,
    /// `CheckoutError::ProductUnavailable`, or `CheckoutError::InsufficientStock`
    /// when the order can't be placed.
    #[instrument(skip_all, fields(method = request.shipping_method.as_str()))]
    pub async fn place_order(
        &mut self,
        buyer: &Buyer<'_>,
        request: &CheckoutRequest,
    ) -> Result<OrderWithItems, CheckoutError> {
        request
            .shipping_address
            .validate()
            .map_err(CheckoutError::InvalidAddress)?;

        let lines: Vec<PendingLine> = match buyer {
            Buyer::User(user_id) => CartRepository::new(&mut *self.conn)
                .list(*user_id)
                .await?
                .into_iter()
                .map(|i| PendingLine {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    color: i.color,
                    size: i.size,
                })
                .collect(),
            Buyer::Guest { items, .. } => items
                .iter()
                .map(|i| PendingLine {
                    product_id: i.product_id,
                    quantity: i.quantity,
                    color: i.color.clone(),
                    size: i.size.clone(),
                })
                .collect(),
        };
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let demand = aggregate_demand(&lines);
        let ids: Vec<ProductId> = demand.keys().copied().collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(&mut *self.conn)
            .lock_for_update(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        check_availability(&demand, &products)?;

        let sales = SaleRepository::new(&mut *self.conn)
            .list_active(self.today)
            .await?;

        let mut list_subtotal = Decimal::ZERO;
        let mut discounted_subtotal = Decimal::ZERO;
        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            let Some(product) = products.get(&line.product_id) else {
                return Err(CheckoutError::ProductUnavailable(line.product_id.to_string()));
            };
            let price = price_product(product, &sales, self.today);
            let qty = Decimal::from(line.quantity);
            list_subtotal += price.list_price * qty;
            discounted_subtotal += price.unit_price * qty;
            priced.push((line, product, price.unit_price));
        }
        let totals = OrderTotals::compute(
            list_subtotal,
            discounted_subtotal,
            request.shipping_method,
            &self.commerce,
        );

        let order_number = generate_order_number(self.today);
        let (user_id, guest_email) = match buyer {
            Buyer::User(id) => (Some(*id), None),
            Buyer::Guest { email, .. } => (None, Some(email.as_str())),
        };
        let mut orders = OrderRepository::new(&mut *self.conn);
        let order = orders
            .create(&OrderDraft {
                order_number: &order_number,
                user_id,
                guest_email,
                address: &request.shipping_address,
                shipping_method: request.shipping_method,
                subtotal: totals.subtotal,
                discount_total: totals.discount_total,
                shipping_cost: totals.shipping_cost,
                tax: totals.tax,
                total: totals.total,
            })
            .await?;

        let mut items = Vec::with_capacity(priced.len());
        for (line, product, unit_price) in priced {
            let item = orders
                .add_item(
                    order.id,
                    product.id,
                    &product.name,
                    unit_price,
                    line.quantity,
                    &line.color,
                    &line.size,
                )
                .await?;
            items.push(item);
        }

        let mut catalog = ProductRepository::new(&mut *self.conn);
        for (product_id, quantity) in &demand {
            catalog.adjust_stock(*product_id, -quantity).await?;
        }

        if let Buyer::User(user_id) = buyer {
            CartRepository::new(&mut *self.conn).clear(*user_id).await?;
        }

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total,
            lines = items.len(),
            "Order placed"
        );
        Ok(OrderWithItems { order, items })
    }

    /// An order with its lines, if `access` may see it.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` when the order is missing or
    /// belongs to someone else.
    pub async fn get(
        &mut self,
        order_id: OrderId,
        access: OrderAccess<'_>,
    ) -> Result<OrderWithItems, CheckoutError> {
        let mut orders = OrderRepository::new(&mut *self.conn);
        let order = orders
            .get(order_id)
            .await?
            .filter(|o| access.permits(o))
            .ok_or(CheckoutError::OrderNotFound)?;
        let items = orders.items(order.id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// An order and its shipments, looked up by order number.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` when the order is missing or
    /// belongs to someone else.
    pub async fn track(
        &mut self,
        order_number: &str,
        access: OrderAccess<'_>,
    ) -> Result<(Order, Vec<Shipment>), CheckoutError> {
        let order = OrderRepository::new(&mut *self.conn)
            .get_by_number(order_number)
            .await?
            .filter(|o| access.permits(o))
            .ok_or(CheckoutError::OrderNotFound)?;
        let shipments = ShipmentRepository::new(&mut *self.conn)
            .list_for_order(order.id)
            .await?;
        Ok((order, shipments))
    }

    /// Cancel a pending or processing order and put its stock back.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` or `CheckoutError::NotCancellable`.
    #[instrument(skip(self, access))]
    pub async fn cancel(
        &mut self,
        order_id: OrderId,
        access: OrderAccess<'_>,
    ) -> Result<Order, CheckoutError> {
        let order = OrderRepository::new(&mut *self.conn)
            .get_for_update(order_id)
            .await?
            .filter(|o| access.permits(o))
            .ok_or(CheckoutError::OrderNotFound)?;
        if !order.status.is_cancellable() {
            return Err(CheckoutError::NotCancellable(order.status));
        }

        self.restock(order.id).await?;
        let order = OrderRepository::new(&mut *self.conn)
            .update_status(order.id, OrderStatus::Cancelled, None)
            .await?;
        tracing::info!(order_number = %order.order_number, "Order cancelled");
        Ok(order)
    }

    /// Admin status change honoring the order state machine.
    ///
    /// Shipping with a tracking number records a shipment; delivery marks
    /// shipments delivered; cancellation restocks.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` or `CheckoutError::InvalidTransition`.
    #[instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(
        &mut self,
        order_id: OrderId,
        update: &StatusUpdate,
    ) -> Result<Order, CheckoutError> {
        let current = OrderRepository::new(&mut *self.conn)
            .get_for_update(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        if !current.status.can_transition_to(update.status) {
            return Err(CheckoutError::InvalidTransition {
                from: current.status,
                to: update.status,
            });
        }

        let tracking = update
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match update.status {
            OrderStatus::Shipped => {
                if let Some(tracking) = tracking {
                    let carrier = update
                        .carrier
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .unwrap_or(DEFAULT_CARRIER);
                    ShipmentRepository::new(&mut *self.conn)
                        .create(order_id, carrier, tracking)
                        .await?;
                }
            }
            OrderStatus::Delivered => {
                ShipmentRepository::new(&mut *self.conn)
                    .set_status_for_order(order_id, "delivered")
                    .await?;
            }
            OrderStatus::Cancelled => self.restock(order_id).await?,
            OrderStatus::Pending | OrderStatus::Processing => {}
        }

        let order = OrderRepository::new(&mut *self.conn)
            .update_status(order_id, update.status, tracking)
            .await?;
        tracing::info!(
            order_number = %order.order_number,
            from = %current.status,
            to = %order.status,
            "Order status changed"
        );
        Ok(order)
    }

    async fn restock(&mut self, order_id: OrderId) -> Result<(), CheckoutError> {
        let items = OrderRepository::new(&mut *self.conn).items(order_id).await?;
        let mut catalog = ProductRepository::new(&mut *self.conn);
        for item in items {
            catalog.adjust_stock(item.product_id, item.quantity).await?;
        }
        Ok(())
    }
}

/// Total quantity per product across lines, ordered by product id so row
/// locks are taken in a stable order.
fn aggregate_demand(lines: &[PendingLine]) -> BTreeMap<ProductId, i32> {
    let mut demand = BTreeMap::new();
    for line in lines {
        *demand.entry(line.product_id).or_insert(0) += line.quantity;
    }
    demand
}

fn check_availability(
    demand: &BTreeMap<ProductId, i32>,
    products: &HashMap<ProductId, Product>,
) -> Result<(), CheckoutError> {
    for (product_id, quantity) in demand {
        let product = products
            .get(product_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| CheckoutError::ProductUnavailable(format!("product {product_id}")))?;
        if !product.has_stock_for(*quantity) {
            return Err(CheckoutError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock_quantity,
            });
        }
    }
    Ok(())
}

/// `IS-YYYYMMDD-XXXXXX` with six random uppercase alphanumerics.
fn generate_order_number(today: NaiveDate) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("IS-{}-{suffix}", today.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::order::fixtures::order;
    use crate::models::product::fixtures::product;

    fn line(id: i32, quantity: i32) -> PendingLine {
        PendingLine {
            product_id: ProductId::new(id),
            quantity,
            color: String::new(),
            size: String::new(),
        }
    }

    #[test]
    fn test_order_number_format() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let number = generate_order_number(today);
        assert!(number.starts_with("IS-20250309-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_demand_sums_variants_of_same_product() {
        let demand = aggregate_demand(&[line(2, 1), line(1, 3), line(2, 4)]);
        assert_eq!(demand.get(&ProductId::new(2)), Some(&5));
        assert_eq!(demand.keys().copied().collect::<Vec<_>>(), vec![
            ProductId::new(1),
            ProductId::new(2)
        ]);
    }

    #[test]
    fn test_availability_checks_aggregate_quantity() {
        let p = product(1, "Tee", "t-shirt", "white");
        let products = HashMap::from([(p.id, p)]);
        let ok = aggregate_demand(&[line(1, 4), line(1, 6)]);
        assert!(check_availability(&ok, &products).is_ok());

        let too_many = aggregate_demand(&[line(1, 4), line(1, 7)]);
        assert!(matches!(
            check_availability(&too_many, &products),
            Err(CheckoutError::InsufficientStock { available: 10, .. })
        ));
    }

    #[test]
    fn test_availability_rejects_inactive_and_missing() {
        let mut p = product(1, "Tee", "t-shirt", "white");
        p.is_active = false;
        let products = HashMap::from([(p.id, p)]);
        assert!(matches!(
            check_availability(&aggregate_demand(&[line(1, 1)]), &products),
            Err(CheckoutError::ProductUnavailable(_))
        ));
        assert!(matches!(
            check_availability(&aggregate_demand(&[line(9, 1)]), &products),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_order_access() {
        let mut order = order(OrderStatus::Delivered, Some(Utc::now()));
        assert!(OrderAccess::Admin.permits(&order));
        assert!(OrderAccess::User(UserId::new(1)).permits(&order));
        assert!(!OrderAccess::User(UserId::new(2)).permits(&order));
        assert!(!OrderAccess::Guest(&[order.id]).permits(&order));

        order.user_id = None;
        assert!(OrderAccess::Guest(&[order.id]).permits(&order));
        assert!(!OrderAccess::Guest(&[]).permits(&order));
    }
}
