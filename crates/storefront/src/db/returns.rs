//! Return request repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use insightshop_core::{OrderId, OrderItemId, ReturnId, ReturnStatus, UserId};

use super::RepositoryError;
use crate::models::return_request::ReturnRequest;

const RETURN_COLUMNS: &str = "id, order_id, order_item_id, user_id, reason, quantity, status, \
                              refund_amount, admin_notes, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    id: i32,
    order_id: i32,
    order_item_id: i32,
    user_id: i32,
    reason: String,
    quantity: i32,
    status: ReturnStatus,
    refund_amount: Decimal,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReturnRow> for ReturnRequest {
    fn from(row: ReturnRow) -> Self {
        Self {
            id: ReturnId::new(row.id),
            order_id: OrderId::new(row.order_id),
            order_item_id: OrderItemId::new(row.order_item_id),
            user_id: UserId::new(row.user_id),
            reason: row.reason,
            quantity: row.quantity,
            status: row.status,
            refund_amount: row.refund_amount,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for return request database operations.
pub struct ReturnRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ReturnRepository<'c> {
    /// Create a new return repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert a return request in the `requested` state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &mut self,
        order_id: OrderId,
        order_item_id: OrderItemId,
        user_id: UserId,
        reason: &str,
        quantity: i32,
        refund_amount: Decimal,
    ) -> Result<ReturnRequest, RepositoryError> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            r"
            INSERT INTO insightshop.return_request
                (order_id, order_item_id, user_id, reason, quantity, refund_amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RETURN_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(order_item_id)
        .bind(user_id)
        .bind(reason)
        .bind(quantity)
        .bind(refund_amount)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Get a return request by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: ReturnId) -> Result<Option<ReturnRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM insightshop.return_request WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// A user's return requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<ReturnRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {RETURN_COLUMNS} FROM insightshop.return_request WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// All return requests, optionally by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &mut self,
        status: Option<ReturnStatus>,
    ) -> Result<Vec<ReturnRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReturnRow>(&format!(
            r"
            SELECT {RETURN_COLUMNS} FROM insightshop.return_request
            WHERE $1::insightshop.return_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Quantity of an order line already claimed by non-rejected requests.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claimed_quantity(&mut self, order_item_id: OrderItemId) -> Result<i32, RepositoryError> {
        let claimed: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(quantity), 0)::bigint FROM insightshop.return_request
            WHERE order_item_id = $1 AND status <> 'rejected'
            ",
        )
        .bind(order_item_id)
        .fetch_one(&mut *self.conn)
        .await?;

        i32::try_from(claimed)
            .map_err(|_| RepositoryError::DataCorruption("return quantity overflow".to_owned()))
    }

    /// Whether an order line has a request still being processed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_open_request(&mut self, order_item_id: OrderItemId) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM insightshop.return_request
                WHERE order_item_id = $1 AND status IN ('requested', 'approved', 'received')
            )
            ",
        )
        .bind(order_item_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(found)
    }

    /// Move a request to `status`, replacing admin notes when given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the request doesn't exist.
    pub async fn update_status(
        &mut self,
        id: ReturnId,
        status: ReturnStatus,
        admin_notes: Option<&str>,
    ) -> Result<ReturnRequest, RepositoryError> {
        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            r"
            UPDATE insightshop.return_request
            SET status = $2, admin_notes = COALESCE($3, admin_notes), updated_at = NOW()
            WHERE id = $1
            RETURNING {RETURN_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .bind(admin_notes)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}
