//! Return merchandise authorization (RMA).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{OrderId, ReturnId, ReturnStatus, UserId, round_money};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, ReturnRepository};
use crate::models::return_request::check_eligibility;
use crate::models::{NewReturn, ReturnEligibility, ReturnRequest};

use super::payments::{PaymentError, PaymentGateway, PaymentService};

/// Longest accepted return reason, in characters.
pub const MAX_REASON_LENGTH: usize = 1000;

/// Errors from return operations.
#[derive(Debug, Error)]
pub enum ReturnError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("order not found")]
    OrderNotFound,

    #[error("return request not found")]
    NotFound,

    #[error("order item not found on this order")]
    ItemNotFound,

    #[error("{0}")]
    NotEligible(String),

    #[error("a return for this item is already in progress")]
    AlreadyRequested,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("cannot move a return from {from} to {to}")]
    InvalidTransition { from: ReturnStatus, to: ReturnStatus },
}

/// Admin decision on a return.
#[derive(Debug, Clone, Deserialize)]
pub struct ReturnDecision {
    pub status: ReturnStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Return service over one connection (normally a transaction).
pub struct ReturnService<'c, G> {
    conn: &'c mut PgConnection,
    gateway: &'c G,
}

impl<'c, G: PaymentGateway> ReturnService<'c, G> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection, gateway: &'c G) -> Self {
        Self { conn, gateway }
    }

    /// Whether the user's order is inside the return window.
    ///
    /// # Errors
    ///
    /// Returns `ReturnError::OrderNotFound` if the order isn't the user's.
    pub async fn check(
        &mut self,
        order_id: OrderId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<ReturnEligibility, ReturnError> {
        let order = OrderRepository::new(&mut *self.conn)
            .get(order_id)
            .await?
            .filter(|o| o.is_owned_by(user_id))
            .ok_or(ReturnError::OrderNotFound)?;
        Ok(check_eligibility(&order, now))
    }

    /// Open a return request for one order line.
    ///
    /// # Errors
    ///
    /// Returns `ReturnError::NotEligible` outside the window,
    /// `ReturnError::AlreadyRequested` when an open request exists, and
    /// `ReturnError::InvalidRequest` when the quantity exceeds what is left.
    #[instrument(skip(self, input), fields(order_id = %input.order_id))]
    pub async fn request(
        &mut self,
        user_id: UserId,
        input: &NewReturn,
        now: DateTime<Utc>,
    ) -> Result<ReturnRequest, ReturnError> {
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(ReturnError::InvalidRequest("a reason is required".to_owned()));
        }
        if reason.chars().count() > MAX_REASON_LENGTH {
            return Err(ReturnError::InvalidRequest(format!(
                "reason must be at most {MAX_REASON_LENGTH} characters"
            )));
        }
        if input.quantity < 1 {
            return Err(ReturnError::InvalidRequest(
                "quantity must be at least 1".to_owned(),
            ));
        }

        let eligibility = self.check(input.order_id, user_id, now).await?;
        if !eligibility.eligible {
            return Err(ReturnError::NotEligible(eligibility.reason));
        }

        let item = OrderRepository::new(&mut *self.conn)
            .get_item(input.order_item_id)
            .await?
            .filter(|i| i.order_id == input.order_id)
            .ok_or(ReturnError::ItemNotFound)?;

        let mut returns = ReturnRepository::new(&mut *self.conn);
        if returns.has_open_request(item.id).await? {
            return Err(ReturnError::AlreadyRequested);
        }
        let remaining = item.quantity - returns.claimed_quantity(item.id).await?;
        if input.quantity > remaining {
            return Err(ReturnError::InvalidRequest(format!(
                "only {} of this item can still be returned",
                remaining.max(0)
            )));
        }

        let refund_amount = round_money(item.price * Decimal::from(input.quantity));
        let request = returns
            .create(
                input.order_id,
                item.id,
                user_id,
                reason,
                input.quantity,
                refund_amount,
            )
            .await?;
        tracing::info!(return_id = %request.id, %refund_amount, "Return requested");
        Ok(request)
    }

    /// Move a return through the RMA workflow.
    ///
    /// Reaching `refunded` puts the items back in stock and refunds the
    /// amount through the payment service.
    ///
    /// # Errors
    ///
    /// Returns `ReturnError::NotFound` or `ReturnError::InvalidTransition`.
    #[instrument(skip(self, decision), fields(status = %decision.status))]
    pub async fn transition(
        &mut self,
        id: ReturnId,
        decision: &ReturnDecision,
    ) -> Result<ReturnRequest, ReturnError> {
        let current = ReturnRepository::new(&mut *self.conn)
            .get(id)
            .await?
            .ok_or(ReturnError::NotFound)?;
        if !current.status.can_transition_to(decision.status) {
            return Err(ReturnError::InvalidTransition {
                from: current.status,
                to: decision.status,
            });
        }

        if decision.status == ReturnStatus::Refunded {
            let item = OrderRepository::new(&mut *self.conn)
                .get_item(current.order_item_id)
                .await?
                .ok_or(ReturnError::ItemNotFound)?;
            ProductRepository::new(&mut *self.conn)
                .adjust_stock(item.product_id, current.quantity)
                .await?;
            PaymentService::new(&mut *self.conn, self.gateway)
                .refund(
                    current.order_id,
                    current.refund_amount,
                    &format!("return {}", current.id),
                )
                .await?;
        }

        let notes = decision
            .admin_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let updated = ReturnRepository::new(&mut *self.conn)
            .update_status(id, decision.status, notes)
            .await?;
        tracing::info!(return_id = %id, from = %current.status, to = %updated.status, "Return updated");
        Ok(updated)
    }

    /// The user's return requests.
    ///
    /// # Errors
    ///
    /// Returns `ReturnError::Repository` if the query fails.
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<ReturnRequest>, ReturnError> {
        Ok(ReturnRepository::new(&mut *self.conn)
            .list_for_user(user_id)
            .await?)
    }
}
