//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use insightshop_core::{ProductId, ReviewId, UserId};

/// Longest accepted review comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// A product review. One per user per product.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: i32,
    pub title: Option<String>,
    pub comment: String,
    /// The reviewer has a delivered order containing the product.
    pub verified_purchase: bool,
    /// Reviewer's first name, when known.
    pub reviewer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review text and rating, for create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: i32,
    pub title: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    /// # Errors
    ///
    /// Returns a message for the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=5).contains(&self.rating) {
            return Err("rating must be between 1 and 5".to_owned());
        }
        if self.comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(format!(
                "comment must be at most {MAX_COMMENT_LENGTH} characters"
            ));
        }
        if self.title.as_ref().is_some_and(|t| t.chars().count() > 200) {
            return Err("title must be at most 200 characters".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(rating: i32, comment: &str) -> ReviewInput {
        ReviewInput {
            rating,
            title: None,
            comment: comment.to_owned(),
        }
    }

    #[test]
    fn test_rating_bounds() {
        assert!(input(1, "").validate().is_ok());
        assert!(input(5, "").validate().is_ok());
        assert!(input(0, "").validate().is_err());
        assert!(input(6, "").validate().is_err());
    }

    #[test]
    fn test_comment_length_counts_chars() {
        assert!(input(4, &"é".repeat(MAX_COMMENT_LENGTH)).validate().is_ok());
        let err = input(4, &"a".repeat(MAX_COMMENT_LENGTH + 1))
            .validate()
            .unwrap_err();
        assert!(err.contains("2000"));
    }
}
