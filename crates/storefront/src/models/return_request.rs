//! Return merchandise authorization (RMA) records and the return window rule.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use insightshop_core::{OrderId, OrderItemId, OrderStatus, ReturnId, ReturnStatus, UserId};

use super::Order;

/// Days after delivery during which a return may be requested (inclusive).
pub const RETURN_WINDOW_DAYS: i64 = 30;

/// A return request for one order line.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnRequest {
    pub id: ReturnId,
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub user_id: UserId,
    pub reason: String,
    pub quantity: i32,
    pub status: ReturnStatus,
    /// Price at purchase times quantity.
    pub refund_amount: Decimal,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for requesting a return.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReturn {
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub quantity: i32,
    pub reason: String,
}

/// Outcome of a return-window check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnEligibility {
    pub eligible: bool,
    pub reason: String,
    /// Whole days left in the window, when eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl ReturnEligibility {
    fn no(reason: &str) -> Self {
        Self {
            eligible: false,
            reason: reason.to_owned(),
            days_remaining: None,
        }
    }
}

/// Check whether `order` can still be returned at `now`.
///
/// The order must be delivered, and `now` must be no more than
/// [`RETURN_WINDOW_DAYS`] after `delivered_at`.
#[must_use]
pub fn check_eligibility(order: &Order, now: DateTime<Utc>) -> ReturnEligibility {
    if order.status != OrderStatus::Delivered {
        return ReturnEligibility::no("order has not been delivered");
    }
    let Some(delivered_at) = order.delivered_at else {
        return ReturnEligibility::no("order has no delivery date");
    };

    let deadline = delivered_at + Duration::days(RETURN_WINDOW_DAYS);
    if now > deadline {
        return ReturnEligibility::no("the 30-day return window has closed");
    }

    ReturnEligibility {
        eligible: true,
        reason: "order is within the 30-day return window".to_owned(),
        days_remaining: Some((deadline - now).num_days()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::fixtures::order;

    #[test]
    fn test_not_delivered_is_ineligible() {
        let result = check_eligibility(&order(OrderStatus::Shipped, None), Utc::now());
        assert!(!result.eligible);
    }

    #[test]
    fn test_window_is_inclusive() {
        let now = Utc::now();
        let delivered = now - Duration::days(RETURN_WINDOW_DAYS);
        let result = check_eligibility(&order(OrderStatus::Delivered, Some(delivered)), now);
        assert!(result.eligible);
        assert_eq!(result.days_remaining, Some(0));
    }

    #[test]
    fn test_window_closed() {
        let now = Utc::now();
        let delivered = now - Duration::days(RETURN_WINDOW_DAYS) - Duration::seconds(1);
        let result = check_eligibility(&order(OrderStatus::Delivered, Some(delivered)), now);
        assert!(!result.eligible);
        assert!(result.reason.contains("closed"));
    }

    #[test]
    fn test_recent_delivery_reports_days_left() {
        let now = Utc::now();
        let delivered = now - Duration::days(3);
        let result = check_eligibility(&order(OrderStatus::Delivered, Some(delivered)), now);
        assert_eq!(result.days_remaining, Some(27));
    }
}
