//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use insightshop_core::{OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId};

/// Delivery speed chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl ShippingMethod {
    pub const ALL: &'static [Self] = &[Self::Standard, Self::Express, Self::Overnight];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Overnight => "overnight",
        }
    }

    /// Customer-facing name with the delivery estimate.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard (5-7 business days)",
            Self::Express => "Express (2-3 business days)",
            Self::Overnight => "Overnight (next business day)",
        }
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            "overnight" => Ok(Self::Overnight),
            _ => Err(format!("invalid shipping method: {s}")),
        }
    }
}

/// Shipping address captured at checkout and snapshotted on the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Longest accepted value for any address field.
    pub const MAX_FIELD_LENGTH: usize = 200;

    /// Check that required fields are present and no field is oversized.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("shipping {field} is required"));
            }
            if value.chars().count() > Self::MAX_FIELD_LENGTH {
                return Err(format!("shipping {field} is too long"));
            }
        }

        for (field, value) in [("line2", &self.line2), ("phone", &self.phone)] {
            if value
                .as_ref()
                .is_some_and(|v| v.chars().count() > Self::MAX_FIELD_LENGTH)
            {
                return Err(format!("shipping {field} is too long"));
            }
        }
        Ok(())
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub guest_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    /// Sum of line prices before sale discounts.
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user_id` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    /// Address to send order emails to, if known without a user lookup.
    #[must_use]
    pub fn guest_contact(&self) -> Option<&str> {
        self.guest_email.as_deref()
    }
}

/// A line on an order, priced at purchase time.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    /// Unit price paid, after any sale discount.
    pub price: Decimal,
    pub quantity: i32,
    pub color: String,
    pub size: String,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// An order owned by user 1 with zero totals.
    pub fn order(status: OrderStatus, delivered_at: Option<DateTime<Utc>>) -> Order {
        Order {
            id: OrderId::new(1),
            order_number: "IS-20250101-ABC123".to_owned(),
            user_id: Some(UserId::new(1)),
            guest_email: None,
            shipping_address: ShippingAddress {
                name: "A".to_owned(),
                line1: "1 St".to_owned(),
                line2: None,
                city: "C".to_owned(),
                state: "S".to_owned(),
                postal_code: "1".to_owned(),
                country: "US".to_owned(),
                phone: None,
            },
            shipping_method: ShippingMethod::Standard,
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            status,
            payment_status: PaymentStatus::Pending,
            tracking_number: None,
            shipped_at: None,
            delivered_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Ada Lovelace".to_owned(),
            line1: "12 Analytical Way".to_owned(),
            line2: None,
            city: "London".to_owned(),
            state: "LDN".to_owned(),
            postal_code: "N1 9GU".to_owned(),
            country: "GB".to_owned(),
            phone: None,
        }
    }

    #[test]
    fn test_address_valid() {
        assert!(address().validate().is_ok());
    }

    #[test]
    fn test_address_requires_city() {
        let addr = ShippingAddress {
            city: "  ".to_owned(),
            ..address()
        };
        assert_eq!(addr.validate().unwrap_err(), "shipping city is required");
    }

    #[test]
    fn test_address_rejects_long_optional_field() {
        let addr = ShippingAddress {
            line2: Some("x".repeat(201)),
            ..address()
        };
        assert_eq!(addr.validate().unwrap_err(), "shipping line2 is too long");
    }

    #[test]
    fn test_shipping_method_parse() {
        assert_eq!("express".parse::<ShippingMethod>().unwrap(), ShippingMethod::Express);
        assert!("teleport".parse::<ShippingMethod>().is_err());
        for method in ShippingMethod::ALL {
            assert_eq!(method.as_str().parse::<ShippingMethod>().unwrap(), *method);
        }
    }
}
