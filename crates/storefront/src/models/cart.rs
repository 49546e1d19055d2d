//! Cart domain types shared by the authenticated and guest carts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use insightshop_core::{CartItemId, ProductId, UserId, round_money};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// An authenticated cart line as stored in `cart_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub color: String,
    pub size: String,
}

/// A guest cart line stored in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCartItem {
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
}

impl GuestCartItem {
    /// Same product in the same variant.
    #[must_use]
    pub fn same_variant(&self, product_id: ProductId, color: &str, size: &str) -> bool {
        self.product_id == product_id
            && self.color.eq_ignore_ascii_case(color)
            && self.size.eq_ignore_ascii_case(size)
    }
}

/// Add `quantity` of a variant to a guest cart, merging with an existing line.
///
/// Returns the resulting line quantity, capped at `max_quantity`.
pub fn merge_guest_item(
    items: &mut Vec<GuestCartItem>,
    product_id: ProductId,
    quantity: i32,
    color: &str,
    size: &str,
    max_quantity: i32,
) -> i32 {
    if let Some(existing) = items
        .iter_mut()
        .find(|i| i.same_variant(product_id, color, size))
    {
        existing.quantity = (existing.quantity + quantity).min(max_quantity);
        return existing.quantity;
    }

    let quantity = quantity.min(max_quantity);
    items.push(GuestCartItem {
        product_id,
        quantity,
        color: color.to_owned(),
        size: size.to_owned(),
    });
    quantity
}

/// A priced cart line, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    /// Cart item id for saved carts, position in the session list for guest carts.
    pub line_id: i32,
    pub product_id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    pub color: String,
    pub size: String,
    pub quantity: i32,
    /// Catalog price before sale discounts.
    pub list_price: Decimal,
    /// Price after the best active sale discount.
    pub unit_price: Decimal,
    pub discount_percentage: i32,
    pub line_total: Decimal,
    /// Whether current stock covers this line.
    pub in_stock: bool,
}

/// A priced cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: i32,
    /// Sum of line totals at list price.
    pub list_subtotal: Decimal,
    /// Sum of line totals after discounts.
    pub subtotal: Decimal,
    pub savings: Decimal,
}

impl CartView {
    /// Total the given lines.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| l.quantity).sum();
        let list_subtotal = round_money(
            lines
                .iter()
                .map(|l| l.list_price * Decimal::from(l.quantity))
                .sum(),
        );
        let subtotal = round_money(lines.iter().map(|l| l.line_total).sum());
        Self {
            lines,
            item_count,
            list_subtotal,
            subtotal,
            savings: list_subtotal - subtotal,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_guest_item_merges_same_variant() {
        let mut items = Vec::new();
        let pid = ProductId::new(5);
        assert_eq!(merge_guest_item(&mut items, pid, 2, "Red", "M", 99), 2);
        assert_eq!(merge_guest_item(&mut items, pid, 3, "red", "m", 99), 5);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_merge_guest_item_keeps_variants_apart() {
        let mut items = Vec::new();
        let pid = ProductId::new(5);
        merge_guest_item(&mut items, pid, 1, "red", "M", 99);
        merge_guest_item(&mut items, pid, 1, "blue", "M", 99);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_merge_guest_item_caps_quantity() {
        let mut items = Vec::new();
        let pid = ProductId::new(5);
        merge_guest_item(&mut items, pid, 8, "", "", 10);
        assert_eq!(merge_guest_item(&mut items, pid, 8, "", "", 10), 10);
    }

    #[test]
    fn test_cart_view_totals() {
        let line = |qty: i32, list: i64, unit: i64| CartLine {
            line_id: 0,
            product_id: ProductId::new(1),
            name: "Tee".to_owned(),
            image_url: None,
            color: String::new(),
            size: String::new(),
            quantity: qty,
            list_price: Decimal::new(list, 2),
            unit_price: Decimal::new(unit, 2),
            discount_percentage: 0,
            line_total: Decimal::new(unit, 2) * Decimal::from(qty),
            in_stock: true,
        };
        let view = CartView::from_lines(vec![line(2, 2000, 1500), line(1, 1000, 1000)]);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.list_subtotal, Decimal::new(5000, 2));
        assert_eq!(view.subtotal, Decimal::new(4000, 2));
        assert_eq!(view.savings, Decimal::new(1000, 2));
    }
}
