//! Payment and payment-log repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use insightshop_core::{OrderId, PaymentId, PaymentLogId, PaymentMethod, PaymentStatus};

use super::RepositoryError;
use crate::models::payment::{Payment, PaymentLogEntry};

const PAYMENT_COLUMNS: &str =
    "id, order_id, amount, currency, method, status, gateway, transaction_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: i32,
    amount: Decimal,
    currency: String,
    method: PaymentMethod,
    status: PaymentStatus,
    gateway: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: PaymentId::new(row.id),
            order_id: OrderId::new(row.order_id),
            amount: row.amount,
            currency: row.currency,
            method: row.method,
            status: row.status,
            gateway: row.gateway,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentLogRow {
    id: i32,
    order_id: i32,
    payment_id: Option<i32>,
    event: String,
    status: PaymentStatus,
    amount: Decimal,
    detail: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<PaymentLogRow> for PaymentLogEntry {
    fn from(row: PaymentLogRow) -> Self {
        Self {
            id: PaymentLogId::new(row.id),
            order_id: OrderId::new(row.order_id),
            payment_id: row.payment_id.map(PaymentId::new),
            event: row.event,
            status: row.status,
            amount: row.amount,
            detail: row.detail,
            created_at: row.created_at,
        }
    }
}

/// Repository for payment database operations.
pub struct PaymentRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PaymentRepository<'c> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Record a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &mut self,
        order_id: OrderId,
        amount: Decimal,
        method: PaymentMethod,
        status: PaymentStatus,
        gateway: &str,
        transaction_id: Option<&str>,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            INSERT INTO insightshop.payment (order_id, amount, method, status, gateway, transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(amount)
        .bind(method)
        .bind(status)
        .bind(gateway)
        .bind(transaction_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// The most recent settled (authorized or paid) payment for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn settled_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            SELECT {PAYMENT_COLUMNS} FROM insightshop.payment
            WHERE order_id = $1 AND status IN ('authorized', 'paid')
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "
        ))
        .bind(order_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Payments for an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM insightshop.payment WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Change a payment's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment doesn't exist.
    pub async fn set_status(
        &mut self,
        id: PaymentId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE insightshop.payment SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Sum of refunds already logged against a payment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn refunded_total(&mut self, payment_id: PaymentId) -> Result<Decimal, RepositoryError> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r"
            SELECT SUM(amount) FROM insightshop.payment_log
            WHERE payment_id = $1 AND event = 'refund'
            ",
        )
        .bind(payment_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    /// Append an audit-log entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log(
        &mut self,
        order_id: OrderId,
        payment_id: Option<PaymentId>,
        event: &str,
        status: PaymentStatus,
        amount: Decimal,
        detail: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO insightshop.payment_log (order_id, payment_id, event, status, amount, detail)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(event)
        .bind(status)
        .bind(amount)
        .bind(detail)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// The audit trail for an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn logs_for_order(
        &mut self,
        order_id: OrderId,
    ) -> Result<Vec<PaymentLogEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentLogRow>(
            r"
            SELECT id, order_id, payment_id, event, status, amount, detail, created_at
            FROM insightshop.payment_log
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
