//! Vector index rebuilds.
//!
//! Only products whose embedding text changed since the last run are sent to
//! the embedding API, in batches. Embeddings of deactivated products are
//! pruned at the end.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, instrument};

use insightshop_core::ProductId;

use crate::db::{EmbeddingRepository, ProductRepository, RepositoryError};
use crate::models::Product;

use super::{EmbeddingClient, EmbeddingError};

/// Products embedded per API request.
const BATCH_SIZE: usize = 64;

/// Outcome of an index rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Products (re)embedded.
    pub embedded: usize,
    /// Products skipped because their text is unchanged.
    pub unchanged: usize,
    /// Embeddings removed for inactive products.
    pub pruned: u64,
}

/// Keeps `product_embedding` in step with the catalog.
#[derive(Clone)]
pub struct ProductIndexer {
    pool: PgPool,
    client: EmbeddingClient,
}

impl ProductIndexer {
    #[must_use]
    pub const fn new(pool: PgPool, client: EmbeddingClient) -> Self {
        Self { pool, client }
    }

    /// Embed every active product whose text changed.
    ///
    /// Each batch is written as soon as it is embedded, so an interrupted run
    /// keeps its progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog can't be read, the embedding API fails,
    /// or a write fails.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<IndexReport, EmbeddingError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let products = ProductRepository::new(&mut conn).list_all_active().await?;
        let stored: HashMap<ProductId, String> = EmbeddingRepository::new(&mut conn)
            .content_hashes()
            .await?
            .into_iter()
            .collect();
        drop(conn);

        let (stale, unchanged) = stale_products(&products, &stored);
        info!(stale = stale.len(), unchanged, "Rebuilding product embeddings");

        let mut report = IndexReport {
            unchanged,
            ..IndexReport::default()
        };

        for batch in stale.chunks(BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(p, _)| p.embedding_text()).collect();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let vectors = self.client.embed_batch(&refs).await?;

            let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
            let mut repo = EmbeddingRepository::new(&mut tx);
            for ((product, hash), vector) in batch.iter().zip(&vectors) {
                repo.upsert(product.id, vector, hash).await?;
            }
            tx.commit().await.map_err(RepositoryError::from)?;
            report.embedded += batch.len();
        }

        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        report.pruned = EmbeddingRepository::new(&mut conn).prune_inactive().await?;

        info!(
            embedded = report.embedded,
            unchanged = report.unchanged,
            pruned = report.pruned,
            "Product embeddings rebuilt"
        );
        Ok(report)
    }

    /// Run [`Self::rebuild`] on a background task.
    pub fn rebuild_async(&self) {
        let indexer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = indexer.rebuild().await {
                error!(error = %e, "Product embedding rebuild failed");
            }
        });
    }
}

/// Split products into those needing a new embedding (with their hash) and
/// a count of unchanged ones.
fn stale_products<'a>(
    products: &'a [Product],
    stored: &HashMap<ProductId, String>,
) -> (Vec<(&'a Product, String)>, usize) {
    let mut stale = Vec::new();
    let mut unchanged = 0;
    for product in products {
        let hash = product.content_hash();
        if stored.get(&product.id) == Some(&hash) {
            unchanged += 1;
        } else {
            stale.push((product, hash));
        }
    }
    (stale, unchanged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    #[test]
    fn test_stale_products_skips_matching_hashes() {
        let products = vec![
            product(1, "Linen Shirt", "shirt", "beige"),
            product(2, "Wrap Dress", "dress", "red"),
            product(3, "Chinos", "pants", "navy"),
        ];
        let mut stored = HashMap::new();
        stored.insert(ProductId::new(1), products[0].content_hash());
        stored.insert(ProductId::new(2), "outdated".to_owned());

        let (stale, unchanged) = stale_products(&products, &stored);
        assert_eq!(unchanged, 1);
        let ids: Vec<i32> = stale.iter().map(|(p, _)| p.id.as_i32()).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(stale[0].1, products[1].content_hash());
    }
}
