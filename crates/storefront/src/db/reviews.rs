//! Review repository.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use insightshop_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::review::{Review, ReviewInput};

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.user_id, r.product_id, r.rating, r.title, r.comment, r.verified_purchase,
           u.first_name AS reviewer_name, r.created_at, r.updated_at
    FROM insightshop.review r
    JOIN insightshop.user u ON u.id = r.user_id
";

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    rating: i32,
    title: Option<String>,
    comment: String,
    verified_purchase: bool,
    reviewer_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: ReviewId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            verified_purchase: row.verified_purchase,
            reviewer_name: row.reviewer_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for review database operations.
///
/// Callers recompute the product rating aggregate in the same transaction
/// after any write.
pub struct ReviewRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ReviewRepository<'c> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &mut self,
        product_id: ProductId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 ORDER BY r.created_at DESC, r.id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a review by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        input: &ReviewInput,
        verified_purchase: bool,
    ) -> Result<ReviewId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO insightshop.review (user_id, product_id, rating, title, comment, verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(input.rating)
        .bind(input.title.as_deref())
        .bind(input.comment.trim())
        .bind(verified_purchase)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| {
            RepositoryError::from_unique_violation(e, "you have already reviewed this product")
        })?;

        Ok(ReviewId::new(id))
    }

    /// Update the author's own review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review doesn't belong to the user.
    pub async fn update(
        &mut self,
        id: ReviewId,
        user_id: UserId,
        input: &ReviewInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE insightshop.review
            SET rating = $3, title = $4, comment = $5, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(input.rating)
        .bind(input.title.as_deref())
        .bind(input.comment.trim())
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a review, returning its product.
    ///
    /// With `owner = Some(user)`, only that user's review is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no matching review exists.
    pub async fn delete(
        &mut self,
        id: ReviewId,
        owner: Option<UserId>,
    ) -> Result<ProductId, RepositoryError> {
        let product_id: Option<i32> = sqlx::query_scalar(
            r"
            DELETE FROM insightshop.review
            WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)
            RETURNING product_id
            ",
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *self.conn)
        .await?;

        product_id.map(ProductId::new).ok_or(RepositoryError::NotFound)
    }
}
