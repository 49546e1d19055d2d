//! Sale repository.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use sqlx::types::Json;

use insightshop_core::{SaleId, SaleType};

use super::RepositoryError;
use crate::models::sale::{NewSale, Sale, SaleFilter};

const SALE_COLUMNS: &str = "id, name, description, sale_type, discount_percentage, start_date, \
                            end_date, is_active, product_filter, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: i32,
    name: String,
    description: String,
    sale_type: SaleType,
    discount_percentage: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_active: bool,
    product_filter: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for Sale {
    type Error = RepositoryError;

    fn try_from(row: SaleRow) -> Result<Self, Self::Error> {
        let product_filter: SaleFilter = serde_json::from_value(row.product_filter)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid sale filter: {e}")))?;

        Ok(Self {
            id: SaleId::new(row.id),
            name: row.name,
            description: row.description,
            sale_type: row.sale_type,
            discount_percentage: row.discount_percentage,
            start_date: row.start_date,
            end_date: row.end_date,
            is_active: row.is_active,
            product_filter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for sale database operations.
pub struct SaleRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SaleRepository<'c> {
    /// Create a new sale repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Sales flagged active whose window contains `today`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&mut self, today: NaiveDate) -> Result<Vec<Sale>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            SELECT {SALE_COLUMNS} FROM insightshop.sale
            WHERE is_active AND start_date <= $1 AND end_date >= $1
            ORDER BY discount_percentage DESC, end_date
            "
        ))
        .bind(today)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Every sale, most recent start first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&mut self) -> Result<Vec<Sale>, RepositoryError> {
        let rows = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM insightshop.sale ORDER BY start_date DESC, id DESC"
        ))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a sale by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: SaleId) -> Result<Option<Sale>, RepositoryError> {
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            "SELECT {SALE_COLUMNS} FROM insightshop.sale WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Whether a sale with this name already starts on `start_date`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&mut self, name: &str, start_date: NaiveDate) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM insightshop.sale WHERE name = $1 AND start_date = $2)",
        )
        .bind(name)
        .bind(start_date)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(found)
    }

    /// Insert a sale.
    ///
    /// `is_active` is set from whether `today` falls in the window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a sale with the same name and
    /// start date exists.
    pub async fn create(&mut self, input: &NewSale, today: NaiveDate) -> Result<Sale, RepositoryError> {
        let active = input.start_date <= today && today <= input.end_date;
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            INSERT INTO insightshop.sale (
                name, description, sale_type, discount_percentage, start_date, end_date,
                is_active, product_filter
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.sale_type)
        .bind(input.discount_percentage)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(active)
        .bind(Json(&input.product_filter))
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            RepositoryError::from_unique_violation(e, "a sale with this name already starts that day")
        })?;

        row.try_into()
    }

    /// Replace a sale's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the sale doesn't exist.
    pub async fn update(
        &mut self,
        id: SaleId,
        input: &NewSale,
        today: NaiveDate,
    ) -> Result<Sale, RepositoryError> {
        let active = input.start_date <= today && today <= input.end_date;
        let row = sqlx::query_as::<_, SaleRow>(&format!(
            r"
            UPDATE insightshop.sale SET
                name = $2, description = $3, sale_type = $4, discount_percentage = $5,
                start_date = $6, end_date = $7, is_active = $8, product_filter = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SALE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.sale_type)
        .bind(input.discount_percentage)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(active)
        .bind(Json(&input.product_filter))
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the sale doesn't exist.
    pub async fn delete(&mut self, id: SaleId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM insightshop.sale WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Turn on sales whose window contains `today` and are not yet active.
    ///
    /// Returns the names of the sales changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activate_current(&mut self, today: NaiveDate) -> Result<Vec<String>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            r"
            UPDATE insightshop.sale SET is_active = TRUE, updated_at = NOW()
            WHERE NOT is_active AND start_date <= $1 AND end_date >= $1
            RETURNING name
            ",
        )
        .bind(today)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(names)
    }

    /// Turn off active sales whose window does not contain `today`.
    ///
    /// Returns the names of the sales changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate_outside_window(
        &mut self,
        today: NaiveDate,
    ) -> Result<Vec<String>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            r"
            UPDATE insightshop.sale SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND (start_date > $1 OR end_date < $1)
            RETURNING name
            ",
        )
        .bind(today)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(names)
    }
}
