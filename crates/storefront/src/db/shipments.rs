//! Shipment tracking repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;

use insightshop_core::{OrderId, ShipmentId};

use super::RepositoryError;

/// A carrier shipment for an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub carrier: String,
    pub tracking_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for shipment database operations.
pub struct ShipmentRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ShipmentRepository<'c> {
    /// Create a new shipment repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Record a shipment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &mut self,
        order_id: OrderId,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<Shipment, RepositoryError> {
        let shipment = sqlx::query_as::<_, Shipment>(
            r"
            INSERT INTO insightshop.shipment (order_id, carrier, tracking_number)
            VALUES ($1, $2, $3)
            RETURNING id, order_id, carrier, tracking_number, status, created_at, updated_at
            ",
        )
        .bind(order_id)
        .bind(carrier)
        .bind(tracking_number)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(shipment)
    }

    /// Mark every shipment of an order with `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_status_for_order(
        &mut self,
        order_id: OrderId,
        status: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE insightshop.shipment SET status = $2, updated_at = NOW() WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(status)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Shipments of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(&mut self, order_id: OrderId) -> Result<Vec<Shipment>, RepositoryError> {
        let rows = sqlx::query_as::<_, Shipment>(
            r"
            SELECT id, order_id, carrier, tracking_number, status, created_at, updated_at
            FROM insightshop.shipment
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}
