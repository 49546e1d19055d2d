//! Promotional sales and their product predicates.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use insightshop_core::{ProductId, SaleId, SaleType};

use super::Product;

/// Largest discount a sale may carry.
pub const MAX_DISCOUNT_PERCENTAGE: i32 = 90;

/// Which products a sale applies to.
///
/// Every present field narrows the match; an empty filter matches every
/// product. String comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clothing_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ids: Option<Vec<ProductId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
}

impl SaleFilter {
    /// Whether `product` satisfies every present constraint.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let in_list = |list: &Option<Vec<String>>, value: Option<&str>| {
            list.as_ref().is_none_or(|l| {
                value.is_some_and(|v| l.iter().any(|x| x.eq_ignore_ascii_case(v)))
            })
        };

        in_list(&self.categories, Some(&product.category))
            && in_list(&self.clothing_types, product.clothing_type.as_deref())
            && self
                .product_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&product.id))
            && self.min_price.is_none_or(|min| product.price >= min)
            && self.max_price.is_none_or(|max| product.price <= max)
    }
}

/// A date-ranged discount.
#[derive(Debug, Clone, Serialize)]
pub struct Sale {
    pub id: SaleId,
    pub name: String,
    pub description: String,
    pub sale_type: SaleType,
    pub discount_percentage: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Maintained by sale automation from the date window.
    pub is_active: bool,
    pub product_filter: SaleFilter,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Whether `today` falls inside `[start_date, end_date]`.
    #[must_use]
    pub fn in_window(&self, today: NaiveDate) -> bool {
        self.start_date <= today && today <= self.end_date
    }

    /// Whether this sale discounts `product` on `today`.
    #[must_use]
    pub fn applies_to(&self, product: &Product, today: NaiveDate) -> bool {
        self.is_active && self.in_window(today) && self.product_filter.matches(product)
    }
}

/// Largest discount percentage among `sales` that apply to `product`, or 0.
#[must_use]
pub fn best_discount(sales: &[Sale], product: &Product, today: NaiveDate) -> i32 {
    sales
        .iter()
        .filter(|s| s.applies_to(product, today))
        .map(|s| s.discount_percentage)
        .max()
        .unwrap_or(0)
}

/// Input for creating a sale.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sale_type: SaleType,
    pub discount_percentage: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub product_filter: SaleFilter,
}

impl NewSale {
    /// # Errors
    ///
    /// Returns a message for the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("sale name is required".to_owned());
        }
        if !(1..=MAX_DISCOUNT_PERCENTAGE).contains(&self.discount_percentage) {
            return Err(format!(
                "discount_percentage must be between 1 and {MAX_DISCOUNT_PERCENTAGE}"
            ));
        }
        if self.start_date > self.end_date {
            return Err("start_date must not be after end_date".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(pct: i32, filter: SaleFilter) -> Sale {
        Sale {
            id: SaleId::new(1),
            name: "Test".to_owned(),
            description: String::new(),
            sale_type: SaleType::Flash,
            discount_percentage: pct,
            start_date: date(2025, 11, 20),
            end_date: date(2025, 11, 30),
            is_active: true,
            product_filter: filter,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(SaleFilter::default().matches(&product(1, "Tee", "t-shirt", "white")));
    }

    #[test]
    fn test_filter_by_category_and_type() {
        let filter = SaleFilter {
            categories: Some(vec!["Women".to_owned()]),
            clothing_types: Some(vec!["dress".to_owned()]),
            ..SaleFilter::default()
        };
        assert!(filter.matches(&product(1, "Wrap", "dress", "red")));
        assert!(!filter.matches(&product(2, "Tee", "t-shirt", "red")));
    }

    #[test]
    fn test_filter_by_price_and_ids() {
        let p = product(3, "Tee", "t-shirt", "white");
        let filter = SaleFilter {
            max_price: Some(Decimal::new(2000, 2)),
            ..SaleFilter::default()
        };
        assert!(!filter.matches(&p));

        let filter = SaleFilter {
            product_ids: Some(vec![ProductId::new(3)]),
            ..SaleFilter::default()
        };
        assert!(filter.matches(&p));
    }

    #[test]
    fn test_filter_parses_from_json() {
        let filter: SaleFilter =
            serde_json::from_value(serde_json::json!({"categories": ["men"]})).unwrap();
        assert_eq!(filter.categories, Some(vec!["men".to_owned()]));
        assert!(filter.clothing_types.is_none());
    }

    #[test]
    fn test_best_discount_picks_largest_applicable() {
        let p = product(1, "Wrap", "dress", "red");
        let dresses = SaleFilter {
            clothing_types: Some(vec!["dress".to_owned()]),
            ..SaleFilter::default()
        };
        let shoes = SaleFilter {
            clothing_types: Some(vec!["shoes".to_owned()]),
            ..SaleFilter::default()
        };
        let sales = vec![sale(10, SaleFilter::default()), sale(25, dresses), sale(40, shoes)];
        assert_eq!(best_discount(&sales, &p, date(2025, 11, 25)), 25);
        assert_eq!(best_discount(&sales, &p, date(2025, 12, 1)), 0);
    }

    #[test]
    fn test_inactive_sale_does_not_apply() {
        let mut s = sale(30, SaleFilter::default());
        s.is_active = false;
        assert!(!s.applies_to(&product(1, "Tee", "t-shirt", "white"), date(2025, 11, 25)));
    }

    #[test]
    fn test_new_sale_validation() {
        let mut input = NewSale {
            name: "Flash".to_owned(),
            description: String::new(),
            sale_type: SaleType::Flash,
            discount_percentage: 20,
            start_date: date(2025, 1, 1),
            end_date: date(2025, 1, 2),
            product_filter: SaleFilter::default(),
        };
        assert!(input.validate().is_ok());
        input.discount_percentage = 95;
        assert!(input.validate().is_err());
        input.discount_percentage = 20;
        input.end_date = date(2024, 12, 31);
        assert!(input.validate().is_err());
    }
}
