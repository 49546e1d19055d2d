//! Product reviews and the rating aggregate.
//!
//! Each write recomputes the product's `rating` and `review_count` on the same
//! connection, so callers running inside a transaction get both or neither.

use sqlx::PgConnection;
use thiserror::Error;
use tracing::instrument;

use insightshop_core::{ProductId, ReviewId, UserId};

use crate::db::{OrderRepository, ProductRepository, RepositoryError, ReviewRepository};
use crate::models::{Review, ReviewInput};

/// Largest page of reviews served at once.
pub const MAX_PAGE: i64 = 50;

/// Errors from review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Invalid(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("review not found")]
    NotFound,

    #[error("you have already reviewed this product")]
    AlreadyReviewed,
}

/// Review service over one connection (normally a transaction).
pub struct ReviewService<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ReviewService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Reviews for an active product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ProductNotFound` for unknown or inactive products.
    pub async fn list(
        &mut self,
        product_id: ProductId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Review>, ReviewError> {
        self.require_product(product_id).await?;
        Ok(ReviewRepository::new(&mut *self.conn)
            .list_for_product(product_id, limit.clamp(1, MAX_PAGE), offset.max(0))
            .await?)
    }

    /// Write the user's review of a product.
    ///
    /// The review is marked as a verified purchase when the user has a
    /// delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Invalid`, `ReviewError::ProductNotFound`, or
    /// `ReviewError::AlreadyReviewed`.
    #[instrument(skip(self, input), fields(rating = input.rating))]
    pub async fn create(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        input: &ReviewInput,
    ) -> Result<Review, ReviewError> {
        input.validate().map_err(ReviewError::Invalid)?;
        self.require_product(product_id).await?;

        let verified = OrderRepository::new(&mut *self.conn)
            .has_delivered_purchase(user_id, product_id)
            .await?;
        let id = ReviewRepository::new(&mut *self.conn)
            .create(user_id, product_id, input, verified)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed,
                other => other.into(),
            })?;

        ProductRepository::new(&mut *self.conn)
            .refresh_rating(product_id)
            .await?;
        self.fetch(id).await
    }

    /// Edit the user's own review.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotFound` if the review isn't the user's.
    pub async fn update(
        &mut self,
        id: ReviewId,
        user_id: UserId,
        input: &ReviewInput,
    ) -> Result<Review, ReviewError> {
        input.validate().map_err(ReviewError::Invalid)?;
        ReviewRepository::new(&mut *self.conn)
            .update(id, user_id, input)
            .await
            .map_err(not_found)?;

        let review = self.fetch(id).await?;
        ProductRepository::new(&mut *self.conn)
            .refresh_rating(review.product_id)
            .await?;
        Ok(review)
    }

    /// Delete a review. `owner = None` is an admin delete.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::NotFound` if no matching review exists.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: ReviewId, owner: Option<UserId>) -> Result<ProductId, ReviewError> {
        let product_id = ReviewRepository::new(&mut *self.conn)
            .delete(id, owner)
            .await
            .map_err(not_found)?;
        ProductRepository::new(&mut *self.conn)
            .refresh_rating(product_id)
            .await?;
        Ok(product_id)
    }

    async fn fetch(&mut self, id: ReviewId) -> Result<Review, ReviewError> {
        ReviewRepository::new(&mut *self.conn)
            .get(id)
            .await?
            .ok_or(ReviewError::NotFound)
    }

    async fn require_product(&mut self, product_id: ProductId) -> Result<(), ReviewError> {
        ProductRepository::new(&mut *self.conn)
            .get(product_id)
            .await?
            .map(|_| ())
            .ok_or(ReviewError::ProductNotFound(product_id))
    }
}

fn not_found(err: RepositoryError) -> ReviewError {
    match err {
        RepositoryError::NotFound => ReviewError::NotFound,
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        assert!(matches!(
            not_found(RepositoryError::NotFound),
            ReviewError::NotFound
        ));
        assert!(matches!(
            not_found(RepositoryError::Conflict("x".to_owned())),
            ReviewError::Repository(RepositoryError::Conflict(_))
        ));
    }
}
