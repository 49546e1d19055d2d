//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use insightshop_core::{Email, UserId};

/// A storefront user (shopper or admin).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    /// Store administrator flag.
    pub is_admin: bool,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Greeting name for emails.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Longest accepted name or phone value.
    pub const MAX_FIELD_LENGTH: usize = 100;

    /// # Errors
    ///
    /// Returns a message naming the first field that is too long.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone", &self.phone),
        ] {
            if value
                .as_deref()
                .is_some_and(|v| v.chars().count() > Self::MAX_FIELD_LENGTH)
            {
                return Err(format!(
                    "{field} must be at most {} characters",
                    Self::MAX_FIELD_LENGTH
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(first_name: Option<&str>) -> User {
        User {
            id: UserId::new(1),
            email: Email::parse("jane@example.com").unwrap(),
            first_name: first_name.map(String::from),
            last_name: None,
            phone: None,
            is_admin: false,
            email_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_prefers_first_name() {
        assert_eq!(user(Some("Jane")).display_name(), "Jane");
        assert_eq!(user(Some("  ")).display_name(), "jane");
        assert_eq!(user(None).display_name(), "jane");
    }

    #[test]
    fn test_profile_update_length_limit() {
        let update = ProfileUpdate {
            first_name: Some("x".repeat(101)),
            ..ProfileUpdate::default()
        };
        assert!(update.validate().unwrap_err().starts_with("first_name"));
        assert!(ProfileUpdate::default().validate().is_ok());
    }
}
