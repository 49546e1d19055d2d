//! Cart operations shared by saved (database) carts and guest (session) carts.
//!
//! Guest carts are passed in as a `Vec<GuestCartItem>` and mutated in place;
//! the caller writes the list back to the session afterwards.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{CartItemId, ProductId, UserId, round_money};

use crate::db::{CartRepository, ProductRepository, RepositoryError, SaleRepository};
use crate::models::cart::merge_guest_item;
use crate::models::{CartLine, CartView, GuestCartItem, MAX_LINE_QUANTITY, Product};

use super::pricing::price_product;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("cart item not found")]
    ItemNotFound,

    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    #[error("{0}")]
    InvalidVariant(String),

    #[error("only {available} of {name} in stock")]
    InsufficientStock { name: String, available: i32 },
}

/// Whose cart is being operated on.
#[derive(Debug)]
pub enum CartOwner {
    User(UserId),
    Guest(Vec<GuestCartItem>),
}

/// Add-to-cart request body.
#[derive(Debug, Clone, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

const fn default_quantity() -> i32 {
    1
}

/// Cart service over one connection (or transaction).
pub struct CartService<'c> {
    conn: &'c mut PgConnection,
    today: NaiveDate,
}

impl<'c> CartService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection, today: NaiveDate) -> Self {
        Self { conn, today }
    }

    /// Priced view of the cart. Lines whose product was deactivated are omitted.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self, owner))]
    pub async fn view(&mut self, owner: &CartOwner) -> Result<CartView, CartError> {
        let raw: Vec<(i32, ProductId, i32, String, String)> = match owner {
            CartOwner::User(user_id) => CartRepository::new(&mut *self.conn)
                .list(*user_id)
                .await?
                .into_iter()
                .map(|i| (i.id.as_i32(), i.product_id, i.quantity, i.color, i.size))
                .collect(),
            CartOwner::Guest(items) => items
                .iter()
                .zip(0..)
                .map(|(i, pos)| (pos, i.product_id, i.quantity, i.color.clone(), i.size.clone()))
                .collect(),
        };
        if raw.is_empty() {
            return Ok(CartView::from_lines(Vec::new()));
        }

        let ids: Vec<ProductId> = raw.iter().map(|(_, pid, ..)| *pid).collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(&mut *self.conn)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let sales = SaleRepository::new(&mut *self.conn).list_active(self.today).await?;

        let lines = raw
            .into_iter()
            .filter_map(|(line_id, product_id, quantity, color, size)| {
                let product = products.get(&product_id)?;
                let priced = price_product(product, &sales, self.today);
                Some(CartLine {
                    line_id,
                    product_id,
                    name: product.name.clone(),
                    image_url: product.image_url.clone(),
                    color,
                    size,
                    quantity,
                    list_price: priced.list_price,
                    unit_price: priced.unit_price,
                    discount_percentage: priced.discount_percentage,
                    line_total: round_money(priced.unit_price * Decimal::from(quantity)),
                    in_stock: product.stock_quantity >= quantity,
                })
            })
            .collect();

        Ok(CartView::from_lines(lines))
    }

    /// Add a product, merging with an existing line for the same variant.
    ///
    /// Returns the line's quantity after the merge.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` for unknown or inactive products,
    /// `CartError::InvalidVariant` for a color/size the product doesn't offer,
    /// and `CartError::InsufficientStock` when the merged quantity exceeds stock.
    #[instrument(skip(self, owner, request), fields(product_id = %request.product_id))]
    pub async fn add(&mut self, owner: &mut CartOwner, request: &AddToCart) -> Result<i32, CartError> {
        check_quantity(request.quantity)?;
        let product = self.active_product(request.product_id).await?;

        let color = canonical_variant(
            &product.available_colors,
            request.color.as_deref().map_or("", str::trim),
        );
        let size = canonical_variant(
            &product.available_sizes,
            request.size.as_deref().map_or("", str::trim),
        );
        if !product.offers_color(color) {
            return Err(CartError::InvalidVariant(format!(
                "{} is not available in {color}",
                product.name
            )));
        }
        if !product.offers_size(size) {
            return Err(CartError::InvalidVariant(format!(
                "{} is not available in size {size}",
                product.name
            )));
        }

        match owner {
            CartOwner::User(user_id) => {
                let mut carts = CartRepository::new(&mut *self.conn);
                let existing = carts
                    .find_variant(*user_id, product.id, color, size)
                    .await?
                    .map_or(0, |item| item.quantity);
                let merged = (existing + request.quantity).min(MAX_LINE_QUANTITY);
                ensure_stock(&product, merged)?;
                let item = carts
                    .upsert(*user_id, product.id, merged, color, size)
                    .await?;
                Ok(item.quantity)
            }
            CartOwner::Guest(items) => {
                let existing = items
                    .iter()
                    .find(|i| i.same_variant(product.id, color, size))
                    .map_or(0, |i| i.quantity);
                ensure_stock(&product, (existing + request.quantity).min(MAX_LINE_QUANTITY))?;
                Ok(merge_guest_item(
                    items,
                    product.id,
                    request.quantity,
                    color,
                    size,
                    MAX_LINE_QUANTITY,
                ))
            }
        }
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// `line_id` is the cart item id for saved carts and the list position
    /// for guest carts.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line doesn't exist and
    /// `CartError::InsufficientStock` if stock can't cover the new quantity.
    #[instrument(skip(self, owner))]
    pub async fn update_quantity(
        &mut self,
        owner: &mut CartOwner,
        line_id: i32,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(owner, line_id).await;
        }
        check_quantity(quantity)?;

        match owner {
            CartOwner::User(user_id) => {
                let item = CartRepository::new(&mut *self.conn)
                    .get(*user_id, CartItemId::new(line_id))
                    .await?
                    .ok_or(CartError::ItemNotFound)?;
                let product = self.active_product(item.product_id).await?;
                ensure_stock(&product, quantity)?;
                CartRepository::new(&mut *self.conn)
                    .set_quantity(*user_id, item.id, quantity)
                    .await?;
            }
            CartOwner::Guest(items) => {
                let product_id = guest_line(items, line_id)?.product_id;
                let product = self.active_product(product_id).await?;
                ensure_stock(&product, quantity)?;
                if let Some(line) = guest_line_mut(items, line_id) {
                    line.quantity = quantity;
                }
            }
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line doesn't exist.
    pub async fn remove(&mut self, owner: &mut CartOwner, line_id: i32) -> Result<(), CartError> {
        match owner {
            CartOwner::User(user_id) => CartRepository::new(&mut *self.conn)
                .remove(*user_id, CartItemId::new(line_id))
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => CartError::ItemNotFound,
                    other => other.into(),
                }),
            CartOwner::Guest(items) => {
                let index = usize::try_from(line_id)
                    .ok()
                    .filter(|&i| i < items.len())
                    .ok_or(CartError::ItemNotFound)?;
                items.remove(index);
                Ok(())
            }
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the delete fails.
    pub async fn clear(&mut self, owner: &mut CartOwner) -> Result<(), CartError> {
        match owner {
            CartOwner::User(user_id) => {
                CartRepository::new(&mut *self.conn).clear(*user_id).await?;
            }
            CartOwner::Guest(items) => items.clear(),
        }
        Ok(())
    }

    /// Fold a guest cart into a user's saved cart after login.
    ///
    /// Quantities for the same variant are summed and capped by stock and the
    /// per-line limit. Lines for unavailable products are dropped. Returns the
    /// number of lines merged.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self, guest_items), fields(lines = guest_items.len()))]
    pub async fn merge_guest_cart(
        &mut self,
        user_id: UserId,
        guest_items: &[GuestCartItem],
    ) -> Result<usize, CartError> {
        let mut merged = 0;
        for item in guest_items {
            let Some(product) = ProductRepository::new(&mut *self.conn)
                .get(item.product_id)
                .await?
            else {
                continue;
            };

            let mut carts = CartRepository::new(&mut *self.conn);
            let existing = carts
                .find_variant(user_id, product.id, &item.color, &item.size)
                .await?
                .map_or(0, |i| i.quantity);
            let quantity = (existing + item.quantity)
                .min(MAX_LINE_QUANTITY)
                .min(product.stock_quantity);
            if quantity < 1 {
                continue;
            }
            carts
                .upsert(user_id, product.id, quantity, &item.color, &item.size)
                .await?;
            merged += 1;
        }
        Ok(merged)
    }

    async fn active_product(&mut self, id: ProductId) -> Result<Product, CartError> {
        ProductRepository::new(&mut *self.conn)
            .get(id)
            .await?
            .ok_or(CartError::ProductNotFound(id))
    }
}

fn check_quantity(quantity: i32) -> Result<(), CartError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CartError::InvalidQuantity)
    }
}

fn ensure_stock(product: &Product, quantity: i32) -> Result<(), CartError> {
    if product.has_stock_for(quantity) {
        Ok(())
    } else {
        Err(CartError::InsufficientStock {
            name: product.name.clone(),
            available: product.stock_quantity,
        })
    }
}

/// The product's own spelling of a requested color or size, so saved lines
/// for the same variant collide on the unique key.
fn canonical_variant<'a>(offered: &'a [String], requested: &'a str) -> &'a str {
    offered
        .iter()
        .find(|v| v.eq_ignore_ascii_case(requested))
        .map_or(requested, String::as_str)
}

fn guest_line(items: &[GuestCartItem], line_id: i32) -> Result<&GuestCartItem, CartError> {
    usize::try_from(line_id)
        .ok()
        .and_then(|i| items.get(i))
        .ok_or(CartError::ItemNotFound)
}

fn guest_line_mut(items: &mut [GuestCartItem], line_id: i32) -> Option<&mut GuestCartItem> {
    usize::try_from(line_id).ok().and_then(|i| items.get_mut(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    #[test]
    fn test_check_quantity_bounds() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(matches!(check_quantity(0), Err(CartError::InvalidQuantity)));
        assert!(matches!(check_quantity(100), Err(CartError::InvalidQuantity)));
    }

    #[test]
    fn test_ensure_stock_reports_available() {
        let p = product(3, "Denim Jacket", "jacket", "blue");
        assert!(ensure_stock(&p, 10).is_ok());
        match ensure_stock(&p, 11) {
            Err(CartError::InsufficientStock { available, .. }) => assert_eq!(available, 10),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn test_canonical_variant_uses_product_spelling() {
        let offered = vec!["Navy".to_owned(), "XL".to_owned()];
        assert_eq!(canonical_variant(&offered, "navy"), "Navy");
        assert_eq!(canonical_variant(&offered, "xl"), "XL");
        assert_eq!(canonical_variant(&offered, "teal"), "teal");
    }

    #[test]
    fn test_guest_line_lookup() {
        let items = vec![GuestCartItem {
            product_id: ProductId::new(1),
            quantity: 2,
            color: String::new(),
            size: String::new(),
        }];
        assert!(guest_line(&items, 0).is_ok());
        assert!(matches!(guest_line(&items, 1), Err(CartError::ItemNotFound)));
        assert!(matches!(guest_line(&items, -1), Err(CartError::ItemNotFound)));
    }

    #[test]
    fn test_error_messages() {
        let err = CartError::InsufficientStock {
            name: "Wrap Dress".to_owned(),
            available: 2,
        };
        assert_eq!(err.to_string(), "only 2 of Wrap Dress in stock");
        assert_eq!(
            CartError::InvalidQuantity.to_string(),
            "quantity must be between 1 and 99"
        );
    }
}
