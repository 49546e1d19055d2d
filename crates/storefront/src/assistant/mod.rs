//! AI shopping assistant.
//!
//! A chat turn runs through these stages:
//!
//! 1. [`intent`] turns the shopper's text into structured filters
//! 2. [`search`] queries the catalog with them, relaxing filters when nothing
//!    matches, and tops up with nearest neighbours from the vector index
//! 3. [`matching`] suggests complementary pieces when the shopper asks what
//!    goes with something
//! 4. [`chat`] wraps the results with Claude, letting it call the
//!    [`tools`] registry, or falls back to a [`reply`] built from the results

pub mod chat;
pub mod intent;
pub mod matching;
pub mod reply;
pub mod search;
pub mod tools;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use insightshop_core::ProductId;

use crate::models::{Product, Sale};
use crate::services::pricing::price_product;

pub use chat::{ChatCaller, ChatError, ChatReply, ChatService, ToolAction};
pub use intent::{ShoppingIntent, extract_intent};
pub use search::{AssistantSearch, ProductResult, ResultSource, SearchHit, SearchOutcome};
pub use tools::{ToolCallError, ToolContext, ToolExecutor, ToolRegistry};

/// Compact product summary returned by the assistant and its tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub clothing_type: Option<String>,
    pub color: Option<String>,
    pub available_colors: Vec<String>,
    pub available_sizes: Vec<String>,
    /// Catalog price.
    pub price: Decimal,
    /// Price after the best active sale, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    pub discount_percentage: i32,
    pub rating: Decimal,
    pub review_count: i32,
    pub in_stock: bool,
    pub image_url: Option<String>,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, sales: &[Sale], today: NaiveDate) -> Self {
        let priced = price_product(product, sales, today);
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            clothing_type: product.clothing_type.clone(),
            color: product.color.clone(),
            available_colors: product.available_colors.clone(),
            available_sizes: product.available_sizes.clone(),
            price: priced.list_price,
            sale_price: (priced.discount_percentage > 0).then_some(priced.unit_price),
            discount_percentage: priced.discount_percentage,
            rating: product.rating,
            review_count: product.review_count,
            in_stock: product.stock_quantity > 0,
            image_url: product.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use insightshop_core::{SaleId, SaleType};

    use super::*;
    use crate::models::SaleFilter;
    use crate::models::product::fixtures::product;

    fn sale(discount: i32, today: NaiveDate) -> Sale {
        Sale {
            id: SaleId::new(1),
            name: "Weekend".to_owned(),
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
    fn test_card_without_sale_has_no_sale_price() {
        let today = Utc::now().date_naive();
        let card = ProductCard::new(&product(1, "Wrap Dress", "dress", "red"), &[], today);
        assert_eq!(card.price, Decimal::new(2999, 2));
        assert_eq!(card.sale_price, None);
        assert_eq!(card.discount_percentage, 0);
        assert!(card.in_stock);
    }

    #[test]
    fn test_card_with_sale() {
        let today = Utc::now().date_naive();
        let card = ProductCard::new(
            &product(1, "Wrap Dress", "dress", "red"),
            &[sale(20, today)],
            today,
        );
        assert_eq!(card.discount_percentage, 20);
        assert!(card.sale_price.is_some_and(|p| p < card.price));
    }
}
