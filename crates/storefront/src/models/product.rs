//! Product catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use insightshop_core::ProductId;

/// Top-level catalog categories.
pub const CATEGORIES: &[&str] = &["men", "women", "kids", "accessories"];

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Pre-markdown price, shown struck through when present.
    pub original_price: Option<Decimal>,
    pub category: String,
    pub clothing_type: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub fabric: Option<String>,
    pub occasion: Option<String>,
    pub age_group: Option<String>,
    pub dress_style: Option<String>,
    pub available_colors: Vec<String>,
    pub available_sizes: Vec<String>,
    pub stock_quantity: i32,
    /// Average review rating (0 when there are no reviews).
    pub rating: Decimal,
    pub review_count: i32,
    pub image_url: Option<String>,
    /// Soft-delete flag. Inactive products are hidden everywhere.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub const fn has_stock_for(&self, quantity: i32) -> bool {
        self.is_active && self.stock_quantity >= quantity
    }

    /// Whether the product offers `color` (case-insensitive).
    ///
    /// A product without variant colors accepts only its own color or none.
    #[must_use]
    pub fn offers_color(&self, color: &str) -> bool {
        if color.is_empty() {
            return true;
        }
        if self.available_colors.is_empty() {
            return self
                .color
                .as_deref()
                .is_none_or(|c| c.eq_ignore_ascii_case(color));
        }
        self.available_colors
            .iter()
            .any(|c| c.eq_ignore_ascii_case(color))
    }

    /// Whether the product offers `size` (case-insensitive).
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        if size.is_empty() {
            return true;
        }
        if self.available_sizes.is_empty() {
            return self
                .size
                .as_deref()
                .is_none_or(|s| s.eq_ignore_ascii_case(size));
        }
        self.available_sizes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(size))
    }

    /// Text fed to the embedding model for the vector index.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.name.clone(), self.category.clone()];
        parts.extend(
            [
                &self.clothing_type,
                &self.color,
                &self.fabric,
                &self.occasion,
                &self.age_group,
                &self.dress_style,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        if !self.available_colors.is_empty() {
            parts.push(format!("colors: {}", self.available_colors.join(", ")));
        }
        parts.push(self.description.clone());
        parts.join(". ")
    }

    /// Hash of [`Self::embedding_text`], used to skip unchanged products on reindex.
    #[must_use]
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.embedding_text().as_bytes()))
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub category: String,
    pub clothing_type: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub fabric: Option<String>,
    pub occasion: Option<String>,
    pub age_group: Option<String>,
    pub dress_style: Option<String>,
    #[serde(default)]
    pub available_colors: Vec<String>,
    #[serde(default)]
    pub available_sizes: Vec<String>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Check field constraints before insert.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        validate_price(self.price)?;
        validate_category(&self.category)?;
        if self.stock_quantity < 0 {
            return Err("stock_quantity cannot be negative".to_owned());
        }
        Ok(())
    }
}

/// Partial product update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub category: Option<String>,
    pub clothing_type: Option<String>,
    pub color: Option<String>,
    pub fabric: Option<String>,
    pub occasion: Option<String>,
    pub age_group: Option<String>,
    pub dress_style: Option<String>,
    pub available_colors: Option<Vec<String>>,
    pub available_sizes: Option<Vec<String>>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Check field constraints for the fields being changed.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message for the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err("name cannot be empty".to_owned());
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(category) = &self.category {
            validate_category(category)?;
        }
        if self.stock_quantity.is_some_and(|q| q < 0) {
            return Err("stock_quantity cannot be negative".to_owned());
        }
        Ok(())
    }
}

fn validate_price(price: Decimal) -> Result<(), String> {
    if price.is_sign_negative() {
        return Err("price cannot be negative".to_owned());
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), String> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(format!(
            "category must be one of: {}",
            CATEGORIES.join(", ")
        ))
    }
}

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// In-stock first, then rating, then id.
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Rating,
    Newest,
}

/// Catalog filter. Every set field narrows the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Free-text match on name and description.
    pub query: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub clothing_type: Option<String>,
    pub occasion: Option<String>,
    pub age_group: Option<String>,
    pub dress_style: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub in_stock_only: bool,
    #[serde(default)]
    pub sort: ProductSort,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProductFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 20;
    /// Largest page the API serves.
    pub const MAX_LIMIT: i64 = 100;

    /// Page size clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    #[must_use]
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A minimal active product for unit tests.
    pub fn product(id: i32, name: &str, clothing_type: &str, color: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::new(2999, 2),
            original_price: None,
            category: "women".to_owned(),
            clothing_type: Some(clothing_type.to_owned()),
            color: Some(color.to_owned()),
            size: None,
            fabric: None,
            occasion: None,
            age_group: None,
            dress_style: None,
            available_colors: Vec::new(),
            available_sizes: Vec::new(),
            stock_quantity: 10,
            rating: Decimal::ZERO,
            review_count: 0,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::product;
    use super::*;

    #[test]
    fn test_has_stock_for() {
        let mut p = product(1, "Tee", "t-shirt", "white");
        assert!(p.has_stock_for(10));
        assert!(!p.has_stock_for(11));
        p.is_active = false;
        assert!(!p.has_stock_for(1));
    }

    #[test]
    fn test_offers_color_uses_variants_when_present() {
        let mut p = product(1, "Tee", "t-shirt", "white");
        assert!(p.offers_color("WHITE"));
        assert!(!p.offers_color("red"));
        p.available_colors = vec!["Red".to_owned(), "Blue".to_owned()];
        assert!(p.offers_color("red"));
        assert!(!p.offers_color("white"));
        assert!(p.offers_color(""));
    }

    #[test]
    fn test_embedding_text_includes_tags() {
        let mut p = product(1, "Linen Shirt", "shirt", "beige");
        p.occasion = Some("casual".to_owned());
        let text = p.embedding_text();
        assert!(text.starts_with("Linen Shirt. women. shirt. beige"));
        assert!(text.contains("casual"));
    }

    #[test]
    fn test_content_hash_changes_with_text() {
        let a = product(1, "Linen Shirt", "shirt", "beige");
        let mut b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
        b.description = "Breathable summer linen".to_owned();
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_new_product_validation() {
        let input: NewProduct = serde_json::from_value(serde_json::json!({
            "name": "Wrap Dress",
            "price": "59.99",
            "category": "women"
        }))
        .expect("deserialize");
        assert!(input.validate().is_ok());

        let bad = NewProduct {
            category: "pets".to_owned(),
            ..input
        };
        assert!(bad.validate().unwrap_err().contains("category must be one of"));
    }

    #[test]
    fn test_filter_limit_clamped() {
        let filter = ProductFilter {
            limit: Some(1000),
            offset: Some(-4),
            ..ProductFilter::default()
        };
        assert_eq!(filter.effective_limit(), ProductFilter::MAX_LIMIT);
        assert_eq!(filter.effective_offset(), 0);
    }
}
