//! Payment processing through a pluggable gateway.
//!
//! Every authorize and refund attempt is written to `payment_log`, including
//! declines, so the audit trail survives even when the payment itself fails.
//! Callers commit the transaction on a decline before returning the error.

use std::future::Future;

use rand::Rng;
use rand::distr::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus};

use crate::db::{OrderRepository, PaymentRepository, RepositoryError};
use crate::models::Payment;

use super::checkout::OrderAccess;

/// Request sent to a gateway to take payment for an order.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub order_number: &'a str,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

/// A gateway's acceptance of an authorize or refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

/// Gateway-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Declined(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// A payment processor.
pub trait PaymentGateway: Send + Sync {
    /// Name stored on each payment record.
    fn name(&self) -> &'static str;

    /// Take (or promise) payment.
    fn authorize(
        &self,
        request: &AuthorizationRequest<'_>,
    ) -> impl Future<Output = Result<GatewayReceipt, GatewayError>> + Send;

    /// Return `amount` against an earlier transaction.
    fn refund(
        &self,
        transaction_id: Option<&str>,
        amount: Decimal,
    ) -> impl Future<Output = Result<GatewayReceipt, GatewayError>> + Send;
}

/// In-house gateway for payment methods settled outside the site.
///
/// Cash on delivery and bank transfer are authorized with a generated
/// reference the customer quotes when paying. Cards need a real processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

impl OfflineGateway {
    fn reference(prefix: &str) -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        format!("{prefix}-{suffix}")
    }
}

impl PaymentGateway for OfflineGateway {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest<'_>,
    ) -> Result<GatewayReceipt, GatewayError> {
        let prefix = match request.method {
            PaymentMethod::CashOnDelivery => "COD",
            PaymentMethod::BankTransfer => "BT",
            PaymentMethod::Card => {
                return Err(GatewayError::Declined(
                    "card payments are not configured".to_owned(),
                ));
            }
        };
        Ok(GatewayReceipt {
            transaction_id: Self::reference(prefix),
            status: PaymentStatus::Authorized,
        })
    }

    async fn refund(
        &self,
        _transaction_id: Option<&str>,
        _amount: Decimal,
    ) -> Result<GatewayReceipt, GatewayError> {
        Ok(GatewayReceipt {
            transaction_id: Self::reference("RF"),
            status: PaymentStatus::Refunded,
        })
    }
}

/// Errors from payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("order not found")]
    OrderNotFound,

    #[error("order has already been paid")]
    AlreadyPaid,

    #[error("cancelled orders cannot be paid")]
    OrderCancelled,

    #[error("payment declined: {0}")]
    Declined(String),

    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Declined(reason) => Self::Declined(reason),
            other @ GatewayError::Unavailable(_) => Self::Gateway(other),
        }
    }
}

/// Payment request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub method: PaymentMethod,
}

/// Result of a refund, whether or not a payment existed to refund against.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub amount: Decimal,
    pub transaction_id: String,
    /// Whether the order's whole settled payment has now been returned.
    pub fully_refunded: bool,
}

/// Payment service over one connection (normally a transaction).
pub struct PaymentService<'c, G> {
    conn: &'c mut PgConnection,
    gateway: &'c G,
}

impl<'c, G: PaymentGateway> PaymentService<'c, G> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection, gateway: &'c G) -> Self {
        Self { conn, gateway }
    }

    /// Pay for an order.
    ///
    /// A second payment for an order that already has a settled payment is
    /// rejected. A declined attempt is logged and marks the order's payment
    /// as failed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::AlreadyPaid`, `PaymentError::OrderCancelled`,
    /// `PaymentError::Declined`, or `PaymentError::OrderNotFound`.
    #[instrument(skip(self, access), fields(gateway = self.gateway.name()))]
    pub async fn pay(
        &mut self,
        order_id: OrderId,
        method: PaymentMethod,
        access: OrderAccess<'_>,
    ) -> Result<Payment, PaymentError> {
        let order = OrderRepository::new(&mut *self.conn)
            .get_for_update(order_id)
            .await?
            .filter(|o| access.permits(o))
            .ok_or(PaymentError::OrderNotFound)?;
        if order.status == OrderStatus::Cancelled {
            return Err(PaymentError::OrderCancelled);
        }
        if order.payment_status.is_settled()
            || PaymentRepository::new(&mut *self.conn)
                .settled_for_order(order.id)
                .await?
                .is_some()
        {
            return Err(PaymentError::AlreadyPaid);
        }

        let request = AuthorizationRequest {
            order_number: &order.order_number,
            amount: order.total,
            method,
        };
        match self.gateway.authorize(&request).await {
            Ok(receipt) => {
                let mut payments = PaymentRepository::new(&mut *self.conn);
                let payment = payments
                    .create(
                        order.id,
                        order.total,
                        method,
                        receipt.status,
                        self.gateway.name(),
                        Some(&receipt.transaction_id),
                    )
                    .await?;
                payments
                    .log(
                        order.id,
                        Some(payment.id),
                        "authorize",
                        receipt.status,
                        order.total,
                        &json!({ "method": method, "transaction_id": receipt.transaction_id }),
                    )
                    .await?;
                OrderRepository::new(&mut *self.conn)
                    .set_payment_status(order.id, receipt.status)
                    .await?;
                tracing::info!(
                    order_number = %order.order_number,
                    method = %method,
                    "Payment authorized"
                );
                Ok(payment)
            }
            Err(err) => {
                PaymentRepository::new(&mut *self.conn)
                    .log(
                        order.id,
                        None,
                        "authorize_failed",
                        PaymentStatus::Failed,
                        order.total,
                        &json!({ "method": method, "error": err.to_string() }),
                    )
                    .await?;
                OrderRepository::new(&mut *self.conn)
                    .set_payment_status(order.id, PaymentStatus::Failed)
                    .await?;
                tracing::warn!(
                    order_number = %order.order_number,
                    method = %method,
                    error = %err,
                    "Payment declined"
                );
                Err(err.into())
            }
        }
    }

    /// Refund part or all of an order.
    ///
    /// Works for orders that were never paid online (the refund is logged
    /// without a payment reference). When this refund and earlier ones
    /// together cover the settled payment, the payment and order are marked
    /// refunded.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Gateway` if the gateway fails; the failure is
    /// logged first.
    #[instrument(skip(self, reason), fields(gateway = self.gateway.name()))]
    pub async fn refund(
        &mut self,
        order_id: OrderId,
        amount: Decimal,
        reason: &str,
    ) -> Result<RefundOutcome, PaymentError> {
        let settled = PaymentRepository::new(&mut *self.conn)
            .settled_for_order(order_id)
            .await?;
        let payment_id = settled.as_ref().map(|p| p.id);

        let receipt = match self
            .gateway
            .refund(
                settled.as_ref().and_then(|p| p.transaction_id.as_deref()),
                amount,
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                PaymentRepository::new(&mut *self.conn)
                    .log(
                        order_id,
                        payment_id,
                        "refund_failed",
                        PaymentStatus::Failed,
                        amount,
                        &json!({ "reason": reason, "error": err.to_string() }),
                    )
                    .await?;
                return Err(err.into());
            }
        };

        let mut payments = PaymentRepository::new(&mut *self.conn);
        let previously_refunded = match payment_id {
            Some(id) => payments.refunded_total(id).await?,
            None => Decimal::ZERO,
        };
        payments
            .log(
                order_id,
                payment_id,
                "refund",
                PaymentStatus::Refunded,
                amount,
                &json!({ "reason": reason, "transaction_id": receipt.transaction_id }),
            )
            .await?;

        let fully_refunded = settled
            .as_ref()
            .is_some_and(|p| covers_payment(previously_refunded, amount, p.amount));
        if let Some(payment) = settled.filter(|_| fully_refunded) {
            payments
                .set_status(payment.id, PaymentStatus::Refunded)
                .await?;
            OrderRepository::new(&mut *self.conn)
                .set_payment_status(order_id, PaymentStatus::Refunded)
                .await?;
        }

        tracing::info!(order_id = %order_id, amount = %amount, fully_refunded, "Refund issued");
        Ok(RefundOutcome {
            amount,
            transaction_id: receipt.transaction_id,
            fully_refunded,
        })
    }
}

/// Whether this refund, together with earlier ones, covers the payment.
fn covers_payment(previously_refunded: Decimal, amount: Decimal, paid: Decimal) -> bool {
    previously_refunded + amount >= paid
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_refunds_add_up() {
        let paid = Decimal::new(10000, 2);
        assert!(!covers_payment(Decimal::ZERO, Decimal::new(4000, 2), paid));
        assert!(!covers_payment(Decimal::new(4000, 2), Decimal::new(5999, 2), paid));
        assert!(covers_payment(Decimal::new(4000, 2), Decimal::new(6000, 2), paid));
        assert!(covers_payment(Decimal::ZERO, paid, paid));
    }

    fn request(method: PaymentMethod) -> AuthorizationRequest<'static> {
        AuthorizationRequest {
            order_number: "IS-20250101-ABC123",
            amount: Decimal::new(4999, 2),
            method,
        }
    }

    #[tokio::test]
    async fn test_offline_gateway_authorizes_cash_on_delivery() {
        let receipt = OfflineGateway
            .authorize(&request(PaymentMethod::CashOnDelivery))
            .await
            .unwrap();
        assert!(receipt.transaction_id.starts_with("COD-"));
        assert_eq!(receipt.transaction_id.len(), 14);
        assert_eq!(receipt.status, PaymentStatus::Authorized);
    }

    #[tokio::test]
    async fn test_offline_gateway_bank_transfer_reference() {
        let receipt = OfflineGateway
            .authorize(&request(PaymentMethod::BankTransfer))
            .await
            .unwrap();
        assert!(receipt.transaction_id.starts_with("BT-"));
    }

    #[tokio::test]
    async fn test_offline_gateway_declines_cards() {
        let err = OfflineGateway
            .authorize(&request(PaymentMethod::Card))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Declined("card payments are not configured".to_owned())
        );
        let payment_err: PaymentError = err.into();
        assert_eq!(
            payment_err.to_string(),
            "payment declined: card payments are not configured"
        );
    }

    #[tokio::test]
    async fn test_offline_refund() {
        let receipt = OfflineGateway
            .refund(Some("COD-ABCDEFGHIJ"), Decimal::ONE)
            .await
            .unwrap();
        assert!(receipt.transaction_id.starts_with("RF-"));
        assert_eq!(receipt.status, PaymentStatus::Refunded);
    }
}
