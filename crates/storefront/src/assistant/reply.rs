//! Replies composed without the language model.
//!
//! Used when Claude isn't configured or a request to it fails, so the chat
//! endpoint always answers from the search results.

use std::fmt::Write as _;

use super::intent::ShoppingIntent;
use super::matching::MatchSuggestion;
use super::search::ProductResult;

/// Products named in a fallback reply.
const MAX_LISTED: usize = 5;

/// Short phrase for what the shopper asked for, e.g. "red dresses for women
/// under $50".
#[must_use]
pub fn describe(intent: &ShoppingIntent) -> String {
    let mut words: Vec<String> = Vec::new();
    if let Some(color) = intent.color {
        words.push(color.to_owned());
    }
    if let Some(style) = intent.dress_style {
        words.push(style.to_owned());
    }
    words.push(intent.clothing_type.map_or_else(|| "items".to_owned(), pluralize));
    if let Some(category) = intent.category {
        words.push(format!("for {category}"));
    }
    if let Some(occasion) = intent.occasion {
        words.push(format!("for {occasion}"));
    }
    match (intent.min_price, intent.max_price) {
        (Some(min), Some(max)) => words.push(format!("between ${min} and ${max}")),
        (None, Some(max)) => words.push(format!("under ${max}")),
        (Some(min), None) => words.push(format!("over ${min}")),
        (None, None) => {}
    }
    words.join(" ")
}

fn pluralize(noun: &str) -> String {
    if noun.ends_with("ss") || noun.ends_with("sh") || noun.ends_with("ch") {
        format!("{noun}es")
    } else if noun.ends_with('s') {
        noun.to_owned()
    } else {
        format!("{noun}s")
    }
}

/// Compose a reply listing the results.
#[must_use]
pub fn compose_reply(
    intent: &ShoppingIntent,
    products: &[ProductResult],
    relaxed: &[&'static str],
    suggestions: &[MatchSuggestion],
) -> String {
    if products.is_empty() {
        if !intent.has_filters() {
            return "Tell me what you're shopping for, for example a color, a type of clothing or an occasion, and I'll find some options.".to_owned();
        }
        return format!(
            "I couldn't find any {} right now. Try a different color or a broader category.",
            describe(intent)
        );
    }

    let mut reply = String::new();
    if relaxed.is_empty() {
        let _ = write!(reply, "Here's what I found for {}:", describe(intent));
    } else {
        let _ = write!(
            reply,
            "I couldn't find an exact match, so I searched without {}. Here's what I found:",
            relaxed
                .iter()
                .map(|f| f.replace('_', " "))
                .collect::<Vec<_>>()
                .join(" or ")
        );
    }

    for result in products.iter().take(MAX_LISTED) {
        let card = &result.product;
        match card.sale_price {
            Some(sale) => {
                let _ = write!(
                    reply,
                    "\n- {} (${sale}, {}% off ${})",
                    card.name, card.discount_percentage, card.price
                );
            }
            None => {
                let _ = write!(reply, "\n- {} (${})", card.name, card.price);
            }
        }
        if !card.in_stock {
            reply.push_str(" - currently out of stock");
        }
    }
    if products.len() > MAX_LISTED {
        let _ = write!(reply, "\n...and {} more.", products.len() - MAX_LISTED);
    }

    if intent.wants_matches
        && let Some(anchor) = products.first()
    {
        if suggestions.is_empty() {
            let _ = write!(
                reply,
                "\n\nI don't have styling suggestions for {} yet.",
                anchor.product.name
            );
        } else {
            let names: Vec<&str> = suggestions.iter().map(|s| s.product.name.as_str()).collect();
            let _ = write!(
                reply,
                "\n\nTo go with {}: {}.",
                anchor.product.name,
                names.join(", ")
            );
        }
    }

    reply
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;
    use crate::assistant::ProductCard;
    use crate::assistant::intent::extract_intent;
    use crate::assistant::search::ResultSource;
    use crate::models::product::fixtures::product;

    fn result(id: i32, name: &str) -> ProductResult {
        let today = Utc::now().date_naive();
        ProductResult {
            product: ProductCard::new(&product(id, name, "dress", "red"), &[], today),
            source: ResultSource::Direct,
            similarity: None,
        }
    }

    #[test]
    fn test_describe() {
        let intent = extract_intent("red dress for women under $50");
        assert_eq!(describe(&intent), "red dresses for women under $50");
        assert_eq!(describe(&ShoppingIntent::default()), "items");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("jeans"), "jeans");
        assert_eq!(pluralize("dress"), "dresses");
        assert_eq!(pluralize("shirt"), "shirts");
    }

    #[test]
    fn test_empty_results() {
        let reply = compose_reply(&extract_intent("green jeans"), &[], &[], &[]);
        assert!(reply.starts_with("I couldn't find any green jeans"));

        let reply = compose_reply(&ShoppingIntent::default(), &[], &[], &[]);
        assert!(reply.starts_with("Tell me what you're shopping for"));
    }

    #[test]
    fn test_lists_products_and_relaxed_filters() {
        let products = vec![result(1, "Wrap Dress"), result(2, "Slip Dress")];
        let reply = compose_reply(&extract_intent("red dress"), &products, &["dress_style"], &[]);
        assert!(reply.contains("without dress style"));
        assert!(reply.contains("- Wrap Dress ($29.99)"));
        assert!(reply.contains("- Slip Dress"));
    }

    #[test]
    fn test_truncates_long_lists() {
        let products: Vec<ProductResult> = (1..=7).map(|i| result(i, "Dress")).collect();
        let reply = compose_reply(&extract_intent("dress"), &products, &[], &[]);
        assert!(reply.ends_with("...and 2 more."));
    }

    #[test]
    fn test_sale_price_shown() {
        let mut r = result(1, "Wrap Dress");
        r.product.sale_price = Some(Decimal::new(2399, 2));
        r.product.discount_percentage = 20;
        let reply = compose_reply(&extract_intent("dress"), &[r], &[], &[]);
        assert!(reply.contains("Wrap Dress ($23.99, 20% off $29.99)"));
    }
}
