//! Sale-aware prices, shipping quotes, and order totals.
//!
//! Everything here is pure so the cart view, checkout, and the assistant's
//! tools all price a product the same way.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use insightshop_core::{apply_discount, round_money};

use crate::config::CommerceConfig;
use crate::models::order::ShippingMethod;
use crate::models::product::Product;
use crate::models::sale::{Sale, best_discount};

/// Standard shipping below the free-shipping threshold. The threshold is
/// compared with the discounted merchandise subtotal, i.e. what the shopper pays.
pub const STANDARD_SHIPPING: Decimal = Decimal::from_parts(599, 0, 0, false, 2);
pub const EXPRESS_SHIPPING: Decimal = Decimal::from_parts(1499, 0, 0, false, 2);
pub const OVERNIGHT_SHIPPING: Decimal = Decimal::from_parts(2999, 0, 0, false, 2);

/// A product's price after the best applicable sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricedProduct {
    pub list_price: Decimal,
    pub unit_price: Decimal,
    /// Percentage taken off `list_price` (0 when no sale applies).
    pub discount_percentage: i32,
}

/// Price `product` against the currently active sales.
#[must_use]
pub fn price_product(product: &Product, sales: &[Sale], today: NaiveDate) -> PricedProduct {
    let discount_percentage = best_discount(sales, product, today);
    PricedProduct {
        list_price: product.price,
        unit_price: apply_discount(product.price, discount_percentage),
        discount_percentage,
    }
}

/// Shipping cost for `method` given the discounted merchandise subtotal.
#[must_use]
pub fn shipping_cost(
    method: ShippingMethod,
    discounted_subtotal: Decimal,
    commerce: &CommerceConfig,
) -> Decimal {
    match method {
        ShippingMethod::Standard if discounted_subtotal >= commerce.free_shipping_threshold => {
            Decimal::ZERO
        }
        ShippingMethod::Standard => STANDARD_SHIPPING,
        ShippingMethod::Express => EXPRESS_SHIPPING,
        ShippingMethod::Overnight => OVERNIGHT_SHIPPING,
    }
}

/// One row of the shipping rate table.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingQuote {
    pub method: ShippingMethod,
    pub label: &'static str,
    pub cost: Decimal,
    /// Remaining spend before standard shipping becomes free.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_shipping_gap: Option<Decimal>,
}

/// Quotes for every shipping method.
#[must_use]
pub fn shipping_quotes(discounted_subtotal: Decimal, commerce: &CommerceConfig) -> Vec<ShippingQuote> {
    ShippingMethod::ALL
        .iter()
        .map(|&method| {
            let cost = shipping_cost(method, discounted_subtotal, commerce);
            let free_shipping_gap = (method == ShippingMethod::Standard && !cost.is_zero())
                .then(|| round_money(commerce.free_shipping_threshold - discounted_subtotal));
            ShippingQuote {
                method,
                label: method.label(),
                cost,
                free_shipping_gap,
            }
        })
        .collect()
}

/// Monetary breakdown stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    /// Sum of list prices.
    pub subtotal: Decimal,
    /// Sale savings, taken off `subtotal`.
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from list and discounted merchandise subtotals.
    ///
    /// Tax applies to the discounted merchandise only, not to shipping.
    #[must_use]
    pub fn compute(
        list_subtotal: Decimal,
        discounted_subtotal: Decimal,
        method: ShippingMethod,
        commerce: &CommerceConfig,
    ) -> Self {
        let subtotal = round_money(list_subtotal);
        let discounted = round_money(discounted_subtotal);
        let discount_total = subtotal - discounted;
        let shipping_cost = shipping_cost(method, discounted, commerce);
        let tax = round_money(discounted * commerce.tax_rate);
        Self {
            subtotal,
            discount_total,
            shipping_cost,
            tax,
            total: discounted + shipping_cost + tax,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use insightshop_core::{SaleId, SaleType};

    use super::*;
    use crate::models::product::fixtures::product;
    use crate::models::sale::SaleFilter;

    fn sale(discount: i32) -> Sale {
        let today = Utc::now().date_naive();
        Sale {
            id: SaleId::new(1),
            name: "Flash".to_owned(),
            description: String::new(),
            sale_type: SaleType::Flash,
            discount_percentage: discount,
            start_date: today,
            end_date: today,
            is_active: true,
            product_filter: SaleFilter::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_price_product_applies_best_sale() {
        let today = Utc::now().date_naive();
        let p = product(1, "Tee", "t-shirt", "white");
        let priced = price_product(&p, &[sale(10), sale(25)], today);
        assert_eq!(priced.list_price, Decimal::new(2999, 2));
        assert_eq!(priced.discount_percentage, 25);
        assert_eq!(priced.unit_price, Decimal::new(2249, 2));
    }

    #[test]
    fn test_price_product_without_sales() {
        let today = Utc::now().date_naive();
        let p = product(1, "Tee", "t-shirt", "white");
        let priced = price_product(&p, &[], today);
        assert_eq!(priced.unit_price, priced.list_price);
        assert_eq!(priced.discount_percentage, 0);
    }

    #[test]
    fn test_standard_shipping_free_at_threshold() {
        let commerce = CommerceConfig::default();
        assert_eq!(
            shipping_cost(ShippingMethod::Standard, Decimal::new(50, 0), &commerce),
            Decimal::ZERO
        );
        assert_eq!(
            shipping_cost(ShippingMethod::Standard, Decimal::new(4999, 2), &commerce),
            STANDARD_SHIPPING
        );
        assert_eq!(
            shipping_cost(ShippingMethod::Overnight, Decimal::new(500, 0), &commerce),
            OVERNIGHT_SHIPPING
        );
    }

    #[test]
    fn test_free_shipping_uses_discounted_subtotal() {
        let commerce = CommerceConfig::default();
        let totals = OrderTotals::compute(
            Decimal::new(55, 0),
            Decimal::new(45, 0),
            ShippingMethod::Standard,
            &commerce,
        );
        assert_eq!(totals.shipping_cost, STANDARD_SHIPPING);

        let totals = OrderTotals::compute(
            Decimal::new(60, 0),
            Decimal::new(50, 0),
            ShippingMethod::Standard,
            &commerce,
        );
        assert_eq!(totals.shipping_cost, Decimal::ZERO);
    }

    #[test]
    fn test_shipping_quotes_report_gap() {
        let quotes = shipping_quotes(Decimal::new(40, 0), &CommerceConfig::default());
        assert_eq!(quotes.len(), 3);
        let standard = quotes.first().unwrap();
        assert_eq!(standard.free_shipping_gap, Some(Decimal::new(1000, 2)));
        assert!(quotes.iter().skip(1).all(|q| q.free_shipping_gap.is_none()));
    }

    #[test]
    fn test_order_totals() {
        let commerce = CommerceConfig::default();
        let totals = OrderTotals::compute(
            Decimal::new(10000, 2),
            Decimal::new(8000, 2),
            ShippingMethod::Express,
            &commerce,
        );
        assert_eq!(totals.subtotal, Decimal::new(10000, 2));
        assert_eq!(totals.discount_total, Decimal::new(2000, 2));
        assert_eq!(totals.shipping_cost, EXPRESS_SHIPPING);
        assert_eq!(totals.tax, Decimal::new(640, 2));
        assert_eq!(totals.total, Decimal::new(10139, 2));
    }
}
