//! Authenticated cart repository.
//!
//! Lines are unique per `(user, product, color, size)`; color and size are
//! stored as empty strings when not chosen.

use sqlx::PgConnection;

use insightshop_core::{CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::CartItem;

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    quantity: i32,
    color: String,
    size: String,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            color: row.color,
            size: row.size,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> CartRepository<'c> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// All lines in a user's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, color, size
            FROM insightshop.cart_item
            WHERE user_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &mut self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, color, size
            FROM insightshop.cart_item
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Find the line for a product variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_variant(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        color: &str,
        size: &str,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT id, user_id, product_id, quantity, color, size
            FROM insightshop.cart_item
            WHERE user_id = $1 AND product_id = $2
              AND lower(color) = lower($3) AND lower(size) = lower($4)
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(color)
        .bind(size)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a variant line or overwrite its quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        color: &str,
        size: &str,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO insightshop.cart_item (user_id, product_id, quantity, color, size)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id, color, size)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            RETURNING id, user_id, product_id, quantity, color, size
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(color)
        .bind(size)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Set the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't belong to the user.
    pub async fn set_quantity(
        &mut self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE insightshop.cart_item SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, product_id, quantity, color, size
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Remove one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't belong to the user.
    pub async fn remove(&mut self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM insightshop.cart_item WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&mut *self.conn)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM insightshop.cart_item WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}
