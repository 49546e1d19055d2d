//! Product search for the assistant: a direct catalog query built from the
//! shopper's intent, relaxed step by step when it finds nothing, then topped
//! up with nearest neighbours from the vector index.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{instrument, warn};

use insightshop_core::ProductId;

use crate::db::{EmbeddingRepository, ProductRepository, RepositoryError};
use crate::embeddings::EmbeddingClient;
use crate::models::{Product, Sale};

use super::ProductCard;
use super::intent::ShoppingIntent;

/// Lowest cosine similarity accepted from the vector index.
pub const MIN_SIMILARITY: f64 = 0.3;

/// Filters dropped, in this order, while the direct query finds nothing.
pub const RELAXATION_ORDER: [&str; 4] = ["dress_style", "occasion", "age_group", "color"];

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Direct,
    Semantic,
}

/// A product found for the shopper.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub product: Product,
    pub source: ResultSource,
    /// Cosine similarity, for semantic hits.
    pub similarity: Option<f64>,
}

impl SearchHit {
    /// Client-facing form of this hit.
    #[must_use]
    pub fn to_result(&self, sales: &[Sale], today: NaiveDate) -> ProductResult {
        ProductResult {
            product: ProductCard::new(&self.product, sales, today),
            source: self.source,
            similarity: self.similarity,
        }
    }
}

/// A search hit as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ProductResult {
    #[serde(flatten)]
    pub product: ProductCard,
    pub source: ResultSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Search results plus how they were obtained.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// Filters dropped to get direct results.
    pub relaxed: Vec<&'static str>,
}

/// Clear the next relaxable filter that is set. Returns its name.
pub fn relax_next(intent: &mut ShoppingIntent) -> Option<&'static str> {
    let slots: [(&'static str, &mut Option<&'static str>); 4] = [
        ("dress_style", &mut intent.dress_style),
        ("occasion", &mut intent.occasion),
        ("age_group", &mut intent.age_group),
        ("color", &mut intent.color),
    ];
    slots
        .into_iter()
        .find(|(_, slot)| slot.is_some())
        .map(|(name, slot)| {
            *slot = None;
            name
        })
}

/// Direct results in order, then semantic results not already present,
/// truncated to `limit`.
#[must_use]
pub fn merge_results(
    direct: Vec<Product>,
    semantic: Vec<(Product, f64)>,
    limit: usize,
) -> Vec<SearchHit> {
    let mut seen: HashSet<ProductId> = HashSet::new();
    let direct = direct.into_iter().map(|product| SearchHit {
        product,
        source: ResultSource::Direct,
        similarity: None,
    });
    let semantic = semantic.into_iter().map(|(product, similarity)| SearchHit {
        product,
        source: ResultSource::Semantic,
        similarity: Some(similarity),
    });
    direct
        .chain(semantic)
        .filter(|hit| seen.insert(hit.product.id))
        .take(limit)
        .collect()
}

/// Assistant product search.
pub struct AssistantSearch<'a> {
    embeddings: Option<&'a EmbeddingClient>,
}

impl<'a> AssistantSearch<'a> {
    #[must_use]
    pub const fn new(embeddings: Option<&'a EmbeddingClient>) -> Self {
        Self { embeddings }
    }

    /// Find up to `limit` products for `intent`, using `raw_text` for the
    /// vector fallback.
    ///
    /// Without any recognised filter the direct query is skipped; listing the
    /// whole catalog isn't an answer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a catalog query fails. Embedding
    /// API failures are logged and the direct results returned alone.
    #[instrument(skip(self, conn, intent, raw_text))]
    pub async fn search(
        &self,
        conn: &mut PgConnection,
        intent: &ShoppingIntent,
        raw_text: &str,
        limit: usize,
    ) -> Result<SearchOutcome, RepositoryError> {
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut relaxed = Vec::new();
        let mut direct = Vec::new();

        if intent.has_filters() {
            let mut current = intent.clone();
            let mut products = ProductRepository::new(&mut *conn);
            direct = products.list(&current.to_filter(sql_limit)).await?;
            while direct.is_empty() {
                let Some(dropped) = relax_next(&mut current) else {
                    break;
                };
                relaxed.push(dropped);
                direct = products.list(&current.to_filter(sql_limit)).await?;
            }
        }

        let mut semantic = Vec::new();
        if direct.len() < limit
            && let Some(client) = self.embeddings
        {
            semantic = self.semantic(conn, client, intent, raw_text, sql_limit).await?;
        }

        Ok(SearchOutcome {
            hits: merge_results(direct, semantic, limit),
            relaxed,
        })
    }

    /// Nearest neighbours of `raw_text`, honouring the intent's price bounds.
    async fn semantic(
        &self,
        conn: &mut PgConnection,
        client: &EmbeddingClient,
        intent: &ShoppingIntent,
        raw_text: &str,
        limit: i64,
    ) -> Result<Vec<(Product, f64)>, RepositoryError> {
        let embedding = match client.embed_query(raw_text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "Query embedding failed, using direct results only");
                return Ok(Vec::new());
            }
        };

        let neighbours = EmbeddingRepository::new(&mut *conn)
            .nearest(&embedding, MIN_SIMILARITY, limit)
            .await?;
        let ids: Vec<ProductId> = neighbours.iter().map(|n| n.product_id).collect();
        let products = ProductRepository::new(&mut *conn).get_many(&ids).await?;

        Ok(products
            .into_iter()
            .filter(|p| intent.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| intent.max_price.is_none_or(|max| p.price <= max))
            .filter_map(|p| {
                let similarity = neighbours
                    .iter()
                    .find(|n| n.product_id == p.id)
                    .map(|n| n.similarity)?;
                Some((p, similarity))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::intent::extract_intent;
    use crate::models::product::fixtures::product;

    #[test]
    fn test_relax_order() {
        let mut intent = extract_intent("red maxi dress for a wedding for kids");
        assert!(intent.dress_style.is_some());
        let mut dropped = Vec::new();
        while let Some(name) = relax_next(&mut intent) {
            dropped.push(name);
        }
        assert_eq!(dropped, RELAXATION_ORDER.to_vec());
        assert_eq!(intent.clothing_type, Some("dress"));
        assert_eq!(intent.category, Some("kids"));
    }

    #[test]
    fn test_relax_skips_unset_filters() {
        let mut intent = extract_intent("black jeans");
        assert_eq!(relax_next(&mut intent), Some("color"));
        assert_eq!(relax_next(&mut intent), None);
        assert_eq!(intent.clothing_type, Some("jeans"));
    }

    #[test]
    fn test_merge_direct_first_and_deduplicated() {
        let direct = vec![product(1, "A", "dress", "red"), product(2, "B", "dress", "red")];
        let semantic = vec![
            (product(2, "B", "dress", "red"), 0.9),
            (product(3, "C", "dress", "pink"), 0.8),
            (product(4, "D", "dress", "pink"), 0.7),
        ];
        let hits = merge_results(direct, semantic, 3);
        let summary: Vec<(i32, ResultSource)> =
            hits.iter().map(|h| (h.product.id.as_i32(), h.source)).collect();
        assert_eq!(
            summary,
            vec![
                (1, ResultSource::Direct),
                (2, ResultSource::Direct),
                (3, ResultSource::Semantic)
            ]
        );
        assert_eq!(hits.last().and_then(|h| h.similarity), Some(0.8));
    }
}
