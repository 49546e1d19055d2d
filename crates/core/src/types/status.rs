//! Status enums for orders, payments, returns, sales, and chat messages.
//!
//! Each enum maps to a `PostgreSQL` enum type in the `insightshop` schema and
//! serializes as `snake_case` text in the JSON API.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display`, and `FromStr` for a fieldless enum.
macro_rules! text_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire/database representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    ///
    /// ```text
    /// pending -> processing | cancelled
    /// processing -> shipped | cancelled
    /// shipped -> delivered
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Orders can be cancelled by the customer until they ship.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Payment status for an order or payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    Failed,
    Refunded,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Authorized => "authorized",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// A settled payment blocks further payment attempts for the order.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Authorized | Self::Paid)
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    CashOnDelivery,
    BankTransfer,
}

text_enum!(PaymentMethod, "payment method", {
    Card => "card",
    CashOnDelivery => "cash_on_delivery",
    BankTransfer => "bank_transfer",
});

/// Return merchandise authorization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.return_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[default]
    Requested,
    Approved,
    Rejected,
    Received,
    Refunded,
}

text_enum!(ReturnStatus, "return status", {
    Requested => "requested",
    Approved => "approved",
    Rejected => "rejected",
    Received => "received",
    Refunded => "refunded",
});

impl ReturnStatus {
    /// Whether a return may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Received)
                | (Self::Received, Self::Refunded)
        )
    }

    /// Requests that still count against the purchased quantity.
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Kind of promotional sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.sale_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    Holiday,
    Flash,
    Seasonal,
    Clearance,
}

text_enum!(SaleType, "sale type", {
    Holiday => "holiday",
    Flash => "flash",
    Seasonal => "seasonal",
    Clearance => "clearance",
});

/// Chat message role for the shopping assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "insightshop.chat_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    ToolUse,
    ToolResult,
}

text_enum!(ChatRole, "chat role", {
    User => "user",
    Assistant => "assistant",
    ToolUse => "tool_use",
    ToolResult => "tool_result",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_order_status_cancellable() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Processing.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
    }

    #[test]
    fn test_return_status_transitions() {
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Approved));
        assert!(ReturnStatus::Requested.can_transition_to(ReturnStatus::Rejected));
        assert!(ReturnStatus::Approved.can_transition_to(ReturnStatus::Received));
        assert!(ReturnStatus::Received.can_transition_to(ReturnStatus::Refunded));
        assert!(!ReturnStatus::Requested.can_transition_to(ReturnStatus::Refunded));
        assert!(!ReturnStatus::Rejected.can_transition_to(ReturnStatus::Approved));
    }

    #[test]
    fn test_text_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse::<PaymentMethod>().unwrap(), *method);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        let err = "teleported".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, "invalid order status: teleported");
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"cash_on_delivery\"");
        let json = serde_json::to_string(&ChatRole::ToolResult).unwrap();
        assert_eq!(json, "\"tool_result\"");
    }

    #[test]
    fn test_payment_status_settled() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Authorized.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
    }
}
