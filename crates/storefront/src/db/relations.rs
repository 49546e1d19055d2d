//! Precomputed "goes well with" product edges.

use sqlx::PgConnection;

use insightshop_core::ProductId;

use super::RepositoryError;

/// Relation type used for outfit pairings.
pub const GOES_WELL_WITH: &str = "goes_well_with";

/// Repository for product relation database operations.
pub struct RelationRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> RelationRepository<'c> {
    /// Create a new relation repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Active products related to `product_id`, highest score first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related_ids(
        &mut self,
        product_id: ProductId,
        limit: i64,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r"
            SELECT r.related_product_id
            FROM insightshop.product_relation r
            JOIN insightshop.product p ON p.id = r.related_product_id
            WHERE r.product_id = $1 AND r.relation_type = $2 AND p.is_active
            ORDER BY r.score DESC, r.related_product_id
            LIMIT $3
            ",
        )
        .bind(product_id)
        .bind(GOES_WELL_WITH)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(ids.into_iter().map(ProductId::new).collect())
    }

    /// Insert or rescore an edge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &mut self,
        product_id: ProductId,
        related_product_id: ProductId,
        score: f64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO insightshop.product_relation (product_id, related_product_id, relation_type, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, related_product_id, relation_type)
            DO UPDATE SET score = EXCLUDED.score
            ",
        )
        .bind(product_id)
        .bind(related_product_id)
        .bind(GOES_WELL_WITH)
        .bind(score)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
