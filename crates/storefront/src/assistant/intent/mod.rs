//! Shopping intent extraction from free-text chat messages.
//!
//! Each attribute is looked up independently in its own keyword table, in
//! three layers: exact alias, known misspelling, then edit distance. A few
//! derived rules fill gaps afterwards.

mod fuzzy;
pub mod tables;

pub use fuzzy::{is_near_miss, levenshtein, tolerance};

use std::collections::HashSet;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::ProductFilter;

use tables::{KeywordTable, MisspellingTable};

const PRICE: &str = r"\$?\s*(\d+(?:\.\d{1,2})?)";

static BETWEEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bbetween\s+{PRICE}\s*(?:and|to|-)\s*{PRICE}")).expect("Invalid regex")
});
static MAX_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:under|below|less than|cheaper than|up to|no more than|at most|max(?:imum)?)\s+{PRICE}"
    ))
    .expect("Invalid regex")
});
static MIN_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:over|above|more than|at least|min(?:imum)?)\s+{PRICE}"))
        .expect("Invalid regex")
});
static MATCHES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:goes? (?:well )?with|pairs? (?:well )?with|match(?:es|ing)?|wear (?:it )?with|style (?:it )?with|complete (?:the|my) (?:look|outfit))\b",
    )
    .expect("Invalid regex")
});

/// Every alias word in every table. Known words are never fuzzy-matched.
static KNOWN_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        tables::OCCASIONS,
        tables::AGE_GROUPS,
        tables::CATEGORIES,
        tables::COLORS,
        tables::CLOTHING_TYPES,
        tables::DRESS_STYLES,
    ]
    .iter()
    .flat_map(|table| table.iter())
    .flat_map(|(_, aliases)| aliases.iter())
    .flat_map(|alias| alias.split(' '))
    .collect()
});

/// What the shopper is looking for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingIntent {
    pub category: Option<&'static str>,
    pub color: Option<&'static str>,
    pub clothing_type: Option<&'static str>,
    pub occasion: Option<&'static str>,
    pub age_group: Option<&'static str>,
    pub dress_style: Option<&'static str>,
    pub max_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    /// The shopper asked what goes with something.
    pub wants_matches: bool,
}

impl ShoppingIntent {
    /// Whether any product attribute or price bound was recognised.
    #[must_use]
    pub const fn has_filters(&self) -> bool {
        self.category.is_some()
            || self.color.is_some()
            || self.clothing_type.is_some()
            || self.occasion.is_some()
            || self.age_group.is_some()
            || self.dress_style.is_some()
            || self.max_price.is_some()
            || self.min_price.is_some()
    }

    /// Catalog filter with every recognised attribute.
    #[must_use]
    pub fn to_filter(&self, limit: i64) -> ProductFilter {
        let owned = |v: Option<&'static str>| v.map(str::to_owned);
        ProductFilter {
            category: owned(self.category),
            color: owned(self.color),
            clothing_type: owned(self.clothing_type),
            occasion: owned(self.occasion),
            age_group: owned(self.age_group),
            dress_style: owned(self.dress_style),
            min_price: self.min_price,
            max_price: self.max_price,
            limit: Some(limit),
            ..ProductFilter::default()
        }
    }
}

/// Extract a shopping intent from a chat message.
#[must_use]
pub fn extract_intent(text: &str) -> ShoppingIntent {
    let normalized = normalize(text);
    let padded = format!(" {normalized} ");
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    let find = |table: KeywordTable, misspellings: MisspellingTable| {
        lookup(&padded, &tokens, table, misspellings)
    };

    let mut intent = ShoppingIntent {
        occasion: find(tables::OCCASIONS, tables::OCCASION_MISSPELLINGS),
        age_group: find(tables::AGE_GROUPS, tables::AGE_GROUP_MISSPELLINGS),
        category: find(tables::CATEGORIES, tables::CATEGORY_MISSPELLINGS),
        color: find(tables::COLORS, tables::COLOR_MISSPELLINGS),
        clothing_type: find(tables::CLOTHING_TYPES, tables::CLOTHING_TYPE_MISSPELLINGS),
        dress_style: find(tables::DRESS_STYLES, tables::DRESS_STYLE_MISSPELLINGS),
        wants_matches: MATCHES_RE.is_match(&normalized),
        ..ShoppingIntent::default()
    };

    // A dress style only makes sense on a dress.
    match intent.clothing_type {
        None if intent.dress_style.is_some() => intent.clothing_type = Some("dress"),
        Some(t) if t != "dress" => intent.dress_style = None,
        _ => {}
    }

    if intent.category.is_none() {
        intent.category = if intent.age_group == Some("kids") {
            Some("kids")
        } else {
            relation_category(&padded)
        };
    }

    let (min_price, max_price) = extract_prices(&text.to_lowercase());
    intent.min_price = min_price;
    intent.max_price = max_price;
    intent
}

/// Lowercase, punctuation to spaces, whitespace collapsed.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First tag of `table` found in the text, trying exact aliases, then known
/// misspellings, then near misses of single-word aliases.
fn lookup(
    padded: &str,
    tokens: &[&str],
    table: KeywordTable,
    misspellings: MisspellingTable,
) -> Option<&'static str> {
    let exact = table.iter().find(|(_, aliases)| {
        aliases
            .iter()
            .any(|alias| padded.contains(&format!(" {alias} ")))
    });
    if let Some((tag, _)) = exact {
        return Some(tag);
    }

    if let Some((_, tag)) = misspellings
        .iter()
        .find(|(miss, _)| tokens.contains(miss))
    {
        return Some(tag);
    }

    let candidates: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !KNOWN_WORDS.contains(t) && !tables::FUZZY_STOPWORDS.contains(t))
        .collect();
    table
        .iter()
        .find(|(_, aliases)| {
            aliases
                .iter()
                .filter(|alias| !alias.contains(' '))
                .any(|alias| candidates.iter().any(|t| is_near_miss(t, alias)))
        })
        .map(|(tag, _)| *tag)
}

/// "for my wife" and similar.
fn relation_category(padded: &str) -> Option<&'static str> {
    tables::RELATION_CATEGORIES
        .iter()
        .find(|(_, words)| words.iter().any(|w| padded.contains(&format!(" {w} "))))
        .map(|(tag, _)| *tag)
}

/// `(min_price, max_price)` from phrases like "under $50", "over 20",
/// "between $30 and $60".
fn extract_prices(text: &str) -> (Option<Decimal>, Option<Decimal>) {
    if let Some(caps) = BETWEEN_RE.captures(text) {
        let a = caps.get(1).and_then(|m| parse_price(m.as_str()));
        let b = caps.get(2).and_then(|m| parse_price(m.as_str()));
        if let (Some(a), Some(b)) = (a, b) {
            return (Some(a.min(b)), Some(a.max(b)));
        }
    }

    let mut taken: Vec<Range<usize>> = Vec::new();
    let max_price = MAX_PRICE_RE.captures(text).and_then(|caps| {
        if let Some(m) = caps.get(0) {
            taken.push(m.range());
        }
        caps.get(1).and_then(|m| parse_price(m.as_str()))
    });

    // "no more than $50" is a maximum, not a minimum.
    let min_price = MIN_PRICE_RE
        .captures_iter(text)
        .filter(|caps| {
            caps.get(0)
                .is_some_and(|m| !taken.iter().any(|r| r.start < m.end() && m.start() < r.end))
        })
        .find_map(|caps| caps.get(1).and_then(|m| parse_price(m.as_str())));

    (min_price, max_price)
}

fn parse_price(s: &str) -> Option<Decimal> {
    Decimal::from_str(s).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Red T-Shirt, please!! "), "red t shirt please");
    }

    #[test]
    fn test_exact_attributes() {
        let intent = extract_intent("Looking for a red maxi dress for a wedding");
        assert_eq!(intent.color, Some("red"));
        assert_eq!(intent.clothing_type, Some("dress"));
        assert_eq!(intent.dress_style, Some("maxi"));
        assert_eq!(intent.occasion, Some("wedding"));
        assert_eq!(intent.category, None);
        assert!(!intent.wants_matches);
    }

    #[test]
    fn test_word_boundaries() {
        let intent = extract_intent("women's jackets");
        assert_eq!(intent.category, Some("women"));
        assert_eq!(intent.clothing_type, Some("jacket"));

        // "tan" must not match inside "tank", "men" not inside "women".
        let intent = extract_intent("black tank top for women");
        assert_eq!(intent.color, Some("black"));
        assert_eq!(intent.clothing_type, Some("top"));
        assert_eq!(intent.category, Some("women"));
    }

    #[test]
    fn test_table_priority() {
        assert_eq!(extract_intent("a white t-shirt").clothing_type, Some("t-shirt"));
        assert_eq!(extract_intent("a dress shirt for work").clothing_type, Some("shirt"));
        assert_eq!(extract_intent("navy blue chinos").color, Some("navy"));
    }

    #[test]
    fn test_misspellings() {
        let intent = extract_intent("blu jens for womans");
        assert_eq!(intent.color, Some("blue"));
        assert_eq!(intent.clothing_type, Some("jeans"));
        assert_eq!(intent.category, Some("women"));
        assert_eq!(extract_intent("tshirt").clothing_type, Some("t-shirt"));
        assert_eq!(extract_intent("a long dres").clothing_type, Some("dress"));
    }

    #[test]
    fn test_fuzzy_matching() {
        assert_eq!(extract_intent("grey sweter").clothing_type, Some("sweater"));
        assert_eq!(extract_intent("leather jackit").clothing_type, Some("jacket"));
        assert_eq!(extract_intent("purpple skirt").color, Some("purple"));
        // Too short for tolerance.
        assert_eq!(extract_intent("rde shoes").color, None);
    }

    #[test]
    fn test_common_words_not_fuzzy_matched() {
        let intent = extract_intent("show me something good to pick");
        assert_eq!(intent.color, None);
        assert!(!intent.has_filters());
    }

    #[test]
    fn test_everyday_words_near_aliases_are_ignored() {
        assert_eq!(extract_intent("what is on sale").color, None);

        let intent = extract_intent("tell me about jackets");
        assert_eq!(intent.color, None);
        assert_eq!(intent.clothing_type, Some("jacket"));

        let intent = extract_intent("i don't mind");
        assert_eq!(intent.dress_style, None);
        assert_eq!(intent.clothing_type, None);

        assert_eq!(extract_intent("make it quick").category, None);

        let intent = extract_intent("a shirt i wore once");
        assert_eq!(intent.occasion, None);
        assert_eq!(intent.clothing_type, Some("shirt"));
    }

    #[test]
    fn test_derived_rules() {
        let intent = extract_intent("bodycon please");
        assert_eq!(intent.clothing_type, Some("dress"));

        let intent = extract_intent("maxi skirt");
        assert_eq!(intent.clothing_type, Some("skirt"));
        assert_eq!(intent.dress_style, None);

        let intent = extract_intent("shoes for toddlers");
        assert_eq!(intent.age_group, Some("kids"));
        assert_eq!(intent.category, Some("kids"));

        assert_eq!(extract_intent("a gift for my wife").category, Some("women"));
        assert_eq!(extract_intent("something for my husband").category, Some("men"));
        assert_eq!(
            extract_intent("men's shirt for my wife").category,
            Some("men"),
            "explicit category wins"
        );
    }

    #[test]
    fn test_price_phrases() {
        let intent = extract_intent("dresses under $50");
        assert_eq!(intent.max_price, Some(dec("50")));
        assert_eq!(intent.min_price, None);

        let intent = extract_intent("jackets over 100.50");
        assert_eq!(intent.min_price, Some(dec("100.50")));

        let intent = extract_intent("shoes between $80 and $40");
        assert_eq!(intent.min_price, Some(dec("40")));
        assert_eq!(intent.max_price, Some(dec("80")));

        let intent = extract_intent("no more than $30");
        assert_eq!(intent.max_price, Some(dec("30")));
        assert_eq!(intent.min_price, None);

        let intent = extract_intent("more than 20 but less than 60");
        assert_eq!(intent.min_price, Some(dec("20")));
        assert_eq!(intent.max_price, Some(dec("60")));
    }

    #[test]
    fn test_wants_matches() {
        assert!(extract_intent("What goes with this navy blazer?").wants_matches);
        assert!(extract_intent("shoes to match my dress").wants_matches);
        assert!(extract_intent("help me complete the look").wants_matches);
        assert!(!extract_intent("red shoes").wants_matches);
    }

    #[test]
    fn test_to_filter() {
        let filter = extract_intent("black jeans under $60").to_filter(10);
        assert_eq!(filter.color.as_deref(), Some("black"));
        assert_eq!(filter.clothing_type.as_deref(), Some("jeans"));
        assert_eq!(filter.max_price, Some(dec("60")));
        assert_eq!(filter.limit, Some(10));
    }
}
