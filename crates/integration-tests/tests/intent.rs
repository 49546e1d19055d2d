//! Integration tests for message understanding.
//!
//! Shopper messages go through intent extraction and come out as the catalog
//! filter the assistant searches with.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use insightshop_storefront::assistant::extract_intent;
use rust_decimal::Decimal;

#[test]
fn test_full_request_becomes_a_filter() {
    let intent = extract_intent("I need a navy maxi dress for a wedding, under $120");
    assert!(intent.has_filters());
    assert!(!intent.wants_matches);

    let filter = intent.to_filter(8);
    assert_eq!(filter.color.as_deref(), Some("navy"));
    assert_eq!(filter.clothing_type.as_deref(), Some("dress"));
    assert_eq!(filter.occasion.as_deref(), Some("wedding"));
    assert_eq!(filter.max_price, Some(Decimal::from_str("120").unwrap()));
    assert_eq!(filter.min_price, None);
    assert_eq!(filter.limit, Some(8));
}

#[test]
fn test_typos_and_relations_still_filter() {
    let intent = extract_intent("a blak sweter for my husband");
    assert_eq!(intent.color, Some("black"));
    assert_eq!(intent.clothing_type, Some("sweater"));
    assert_eq!(intent.category, Some("men"));
}

#[test]
fn test_small_talk_has_no_filters() {
    for message in ["hello there", "thanks so much!", "what can you do?"] {
        let intent = extract_intent(message);
        assert!(!intent.has_filters(), "{message} produced {intent:?}");
        assert!(!intent.wants_matches, "{message}");
    }
}

#[test]
fn test_matching_questions_keep_attributes() {
    let intent = extract_intent("what goes with my red dress?");
    assert!(intent.wants_matches);
    assert_eq!(intent.color, Some("red"));
}
