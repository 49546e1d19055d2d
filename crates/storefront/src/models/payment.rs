//! Payment records and the payment audit log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use insightshop_core::{OrderId, PaymentId, PaymentLogId, PaymentMethod, PaymentStatus};

/// A payment against an order.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Name of the gateway that processed the payment.
    pub gateway: String,
    /// Gateway reference, if one was issued.
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One audit-trail entry. Every authorize or refund attempt writes one,
/// whether it succeeded or not.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLogEntry {
    pub id: PaymentLogId,
    pub order_id: OrderId,
    pub payment_id: Option<PaymentId>,
    /// `authorize`, `authorize_failed`, `refund`, or `refund_failed`.
    pub event: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
