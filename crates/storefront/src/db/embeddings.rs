//! Product embedding storage and nearest-neighbor lookup (pgvector).
//!
//! `SQLx` has no built-in pgvector type, so vectors travel as their text form
//! (`[0.1,0.2,...]`) and are cast with `::vector` in SQL.

use sqlx::{PgConnection, Row};

use insightshop_core::ProductId;

use super::RepositoryError;

/// A product ranked by cosine similarity to a query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarProduct {
    pub product_id: ProductId,
    pub similarity: f64,
}

/// Format an embedding as a pgvector literal.
#[must_use]
pub fn format_embedding(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(ToString::to_string).collect();
    format!("[{}]", values.join(","))
}

/// Repository for product embedding operations.
pub struct EmbeddingRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> EmbeddingRepository<'c> {
    /// Create a new embedding repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Active products closest to `embedding`, with similarity at least
    /// `min_similarity`, best first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn nearest(
        &mut self,
        embedding: &[f32],
        min_similarity: f64,
        limit: i64,
    ) -> Result<Vec<SimilarProduct>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT e.product_id, 1 - (e.embedding <=> $1::vector) AS similarity
            FROM insightshop.product_embedding e
            JOIN insightshop.product p ON p.id = e.product_id
            WHERE p.is_active AND 1 - (e.embedding <=> $1::vector) >= $2
            ORDER BY e.embedding <=> $1::vector
            LIMIT $3
            ",
        )
        .bind(format_embedding(embedding))
        .bind(min_similarity)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<SimilarProduct, RepositoryError> {
                Ok(SimilarProduct {
                    product_id: ProductId::new(r.try_get("product_id")?),
                    similarity: r.try_get("similarity")?,
                })
            })
            .collect()
    }

    /// Stored content hashes, for skipping unchanged products on reindex.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn content_hashes(&mut self) -> Result<Vec<(ProductId, String)>, RepositoryError> {
        let rows: Vec<(i32, String)> =
            sqlx::query_as("SELECT product_id, content_hash FROM insightshop.product_embedding")
                .fetch_all(&mut *self.conn)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, hash)| (ProductId::new(id), hash))
            .collect())
    }

    /// Insert or replace a product's embedding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &mut self,
        product_id: ProductId,
        embedding: &[f32],
        content_hash: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO insightshop.product_embedding (product_id, embedding, content_hash)
            VALUES ($1, $2::vector, $3)
            ON CONFLICT (product_id) DO UPDATE
            SET embedding = EXCLUDED.embedding, content_hash = EXCLUDED.content_hash,
                updated_at = NOW()
            ",
        )
        .bind(product_id)
        .bind(format_embedding(embedding))
        .bind(content_hash)
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    /// Drop embeddings of products that are no longer active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn prune_inactive(&mut self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM insightshop.product_embedding e
            USING insightshop.product p
            WHERE p.id = e.product_id AND NOT p.is_active
            ",
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_embedding() {
        assert_eq!(format_embedding(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(format_embedding(&[]), "[]");
    }
}
