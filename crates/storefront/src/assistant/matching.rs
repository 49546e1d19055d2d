//! "Goes well with" suggestions.
//!
//! Curated `product_relation` edges come first. The rest is filled from a
//! heuristic over clothing types, color harmony, and occasion.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgConnection;

use insightshop_core::ProductId;

use crate::db::{ProductRepository, RelationRepository, RepositoryError, SaleRepository};
use crate::models::{Product, ProductFilter};

use super::ProductCard;

/// Most suggestions returned for one product.
pub const MAX_SUGGESTIONS: usize = 6;

const TYPE_SCORE: f64 = 2.0;
const COLOR_SCORE: f64 = 1.0;
const OCCASION_SCORE: f64 = 0.5;

/// Candidate pool size per category when scoring heuristically.
const CANDIDATE_POOL: i64 = 100;

/// Colors that go with anything.
const NEUTRALS: &[&str] = &["black", "white", "gray", "grey", "beige", "navy"];

/// Complementary color pairs (either order).
const COLOR_PAIRS: &[(&str, &str)] = &[
    ("blue", "orange"),
    ("red", "green"),
    ("purple", "yellow"),
    ("pink", "blue"),
    ("brown", "blue"),
];

/// Types that complete an outfit built around the key type. `accessories`
/// stands for anything in the accessories category.
const COMPLEMENTS: &[(&str, &[&str])] = &[
    ("shirt", &["pants", "jeans", "blazer", "shoes", "shorts", "skirt"]),
    ("t-shirt", &["jeans", "shorts", "pants", "jacket", "shoes"]),
    ("blouse", &["skirt", "pants", "jeans", "blazer", "shoes"]),
    ("sweater", &["jeans", "pants", "skirt", "coat", "shoes"]),
    ("top", &["skirt", "jeans", "shorts", "pants", "jacket"]),
    ("pants", &["shirt", "blouse", "sweater", "blazer", "shoes"]),
    ("jeans", &["t-shirt", "shirt", "sweater", "jacket", "shoes"]),
    ("shorts", &["t-shirt", "shirt", "top", "shoes"]),
    ("skirt", &["blouse", "top", "sweater", "jacket", "shoes"]),
    ("dress", &["shoes", "jacket", "blazer", "coat", "accessories"]),
    ("blazer", &["shirt", "blouse", "pants", "dress"]),
    ("jacket", &["t-shirt", "jeans", "dress", "sweater"]),
    ("coat", &["sweater", "pants", "dress", "accessories"]),
    ("suit", &["shirt", "shoes", "accessories"]),
    ("shoes", &["pants", "jeans", "dress", "skirt"]),
];

/// Why a product was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// A curated relation edge.
    Curated,
    CompletesOutfit,
    ColorHarmony,
    SameOccasion,
}

/// A scored suggestion before pricing.
#[derive(Debug, Clone)]
pub struct ScoredMatch<'a> {
    pub product: &'a Product,
    pub score: f64,
    pub reasons: Vec<MatchReason>,
}

/// A priced suggestion, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct MatchSuggestion {
    #[serde(flatten)]
    pub product: ProductCard,
    pub score: f64,
    pub reasons: Vec<MatchReason>,
}

/// Whether two colors go together.
#[must_use]
pub fn colors_harmonize(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    NEUTRALS.contains(&a.as_str())
        || NEUTRALS.contains(&b.as_str())
        || COLOR_PAIRS
            .iter()
            .any(|&(x, y)| (a == x && b == y) || (a == y && b == x))
}

/// Whether `candidate` completes an outfit around a `key_type` item.
fn completes_outfit(key_type: &str, candidate: &Product) -> bool {
    let Some((_, complements)) = COMPLEMENTS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(key_type))
    else {
        return false;
    };
    complements.iter().any(|&c| {
        if c == "accessories" {
            candidate.category == "accessories"
        } else {
            candidate
                .clothing_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(c))
        }
    })
}

/// Rank suggestions for `product`.
///
/// `curated` are relation-edge targets in edge order; `candidates` is the
/// pool for heuristic scoring. Inactive, out-of-stock, and duplicate
/// products are skipped.
#[must_use]
pub fn suggest_matches<'a>(
    product: &Product,
    curated: &'a [Product],
    candidates: &'a [Product],
) -> Vec<ScoredMatch<'a>> {
    let mut seen: HashSet<ProductId> = HashSet::from([product.id]);
    let mut out: Vec<ScoredMatch<'a>> = curated
        .iter()
        .filter(|p| p.is_active && seen.insert(p.id))
        .take(MAX_SUGGESTIONS)
        .map(|p| ScoredMatch {
            product: p,
            score: f64::INFINITY,
            reasons: vec![MatchReason::Curated],
        })
        .collect();

    let mut scored: Vec<ScoredMatch<'a>> = candidates
        .iter()
        .filter(|c| c.is_active && c.stock_quantity > 0 && !seen.contains(&c.id))
        .filter(|c| c.category == product.category || c.category == "accessories")
        .filter_map(|c| score_candidate(product, c))
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.product.rating.cmp(&a.product.rating))
            .then_with(|| a.product.id.cmp(&b.product.id))
    });

    for m in scored {
        if out.len() >= MAX_SUGGESTIONS {
            break;
        }
        if seen.insert(m.product.id) {
            out.push(m);
        }
    }
    out
}

/// Score one candidate. Only complementary items are suggested; color and
/// occasion refine the ranking.
fn score_candidate<'a>(product: &Product, candidate: &'a Product) -> Option<ScoredMatch<'a>> {
    let key_type = product.clothing_type.as_deref()?;
    if !completes_outfit(key_type, candidate) {
        return None;
    }
    let mut score = TYPE_SCORE;
    let mut reasons = vec![MatchReason::CompletesOutfit];

    if let (Some(a), Some(b)) = (product.color.as_deref(), candidate.color.as_deref())
        && colors_harmonize(a, b)
    {
        score += COLOR_SCORE;
        reasons.push(MatchReason::ColorHarmony);
    }
    if let (Some(a), Some(b)) = (product.occasion.as_deref(), candidate.occasion.as_deref())
        && a.eq_ignore_ascii_case(b)
    {
        score += OCCASION_SCORE;
        reasons.push(MatchReason::SameOccasion);
    }

    Some(ScoredMatch {
        product: candidate,
        score,
        reasons,
    })
}

/// Load curated edges and a candidate pool, then rank and price suggestions.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn recommend_matches(
    conn: &mut PgConnection,
    product: &Product,
    today: NaiveDate,
) -> Result<Vec<MatchSuggestion>, RepositoryError> {
    let related_ids = RelationRepository::new(&mut *conn)
        .related_ids(product.id, i64::try_from(MAX_SUGGESTIONS).unwrap_or(i64::MAX))
        .await?;

    let mut products = ProductRepository::new(&mut *conn);
    let curated = products.get_many(&related_ids).await?;

    let pool_filter = |category: &str| ProductFilter {
        category: Some(category.to_owned()),
        in_stock_only: true,
        limit: Some(CANDIDATE_POOL),
        ..ProductFilter::default()
    };
    let mut candidates = products.list(&pool_filter(&product.category)).await?;
    if product.category != "accessories" {
        candidates.extend(products.list(&pool_filter("accessories")).await?);
    }

    let sales = SaleRepository::new(&mut *conn).list_active(today).await?;
    Ok(suggest_matches(product, &curated, &candidates)
        .into_iter()
        .map(|m| MatchSuggestion {
            product: ProductCard::new(m.product, &sales, today),
            score: if m.score.is_finite() { m.score } else { 0.0 },
            reasons: m.reasons,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;

    fn ids(matches: &[ScoredMatch<'_>]) -> Vec<i32> {
        matches.iter().map(|m| m.product.id.as_i32()).collect()
    }

    #[test]
    fn test_colors_harmonize() {
        assert!(colors_harmonize("Navy", "red"));
        assert!(colors_harmonize("orange", "blue"));
        assert!(colors_harmonize("blue", "orange"));
        assert!(!colors_harmonize("red", "purple"));
        assert!(!colors_harmonize("", "black"));
    }

    #[test]
    fn test_heuristic_ranking() {
        let mut shirt = product(1, "Oxford Shirt", "shirt", "blue");
        shirt.occasion = Some("work".to_owned());

        let mut chinos = product(2, "Chinos", "pants", "beige");
        chinos.occasion = Some("work".to_owned());
        let jeans = product(3, "Jeans", "jeans", "orange");
        let shoes = product(4, "Loafers", "shoes", "red");
        let other_shirt = product(5, "Tee", "shirt", "white");

        let pool = vec![shoes, jeans, chinos, other_shirt];
        let matches = suggest_matches(&shirt, &[], &pool);

        assert_eq!(ids(&matches), vec![2, 3, 4]);
        assert!((matches[0].score - 3.5).abs() < f64::EPSILON);
        assert_eq!(
            matches[0].reasons,
            vec![
                MatchReason::CompletesOutfit,
                MatchReason::ColorHarmony,
                MatchReason::SameOccasion
            ]
        );
        assert!((matches[2].score - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_curated_first_and_deduplicated() {
        let dress = product(1, "Wrap Dress", "dress", "red");
        let curated = vec![product(9, "Clutch", "bag", "gold")];
        let mut pool = vec![
            product(9, "Clutch", "bag", "gold"),
            product(7, "Heels", "shoes", "black"),
        ];
        pool[0].category = "accessories".to_owned();

        let matches = suggest_matches(&dress, &curated, &pool);
        assert_eq!(ids(&matches), vec![9, 7]);
        assert_eq!(matches[0].reasons, vec![MatchReason::Curated]);
    }

    #[test]
    fn test_skips_out_of_stock_and_other_categories() {
        let shirt = product(1, "Shirt", "shirt", "white");
        let mut sold_out = product(2, "Pants", "pants", "black");
        sold_out.stock_quantity = 0;
        let mut mens = product(3, "Pants", "pants", "black");
        mens.category = "men".to_owned();

        assert!(suggest_matches(&shirt, &[], &[sold_out, mens]).is_empty());
    }

    #[test]
    fn test_capped_at_max() {
        let shirt = product(1, "Shirt", "shirt", "white");
        let pool: Vec<Product> = (2..12).map(|i| product(i, "Pants", "pants", "black")).collect();
        assert_eq!(suggest_matches(&shirt, &[], &pool).len(), MAX_SUGGESTIONS);
    }
}
