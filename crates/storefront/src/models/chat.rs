//! Assistant chat history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use insightshop_core::{ChatMessageId, ChatRole, ChatSessionId, UserId};

/// An assistant conversation.
///
/// Logged-in conversations are owned by `user_id`; guest conversations are
/// bound to a random key stored in the guest's HTTP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: ChatSessionId,
    pub user_id: Option<UserId>,
    #[serde(skip_serializing)]
    pub guest_key: Option<String>,
    /// Generated from the first message.
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Whether the caller identified by `user_id` or `guest_key` owns this session.
    #[must_use]
    pub fn is_owned_by(&self, user_id: Option<UserId>, guest_key: Option<&str>) -> bool {
        match (self.user_id, user_id) {
            (Some(owner), Some(caller)) => owner == caller,
            (None, None) => self
                .guest_key
                .as_deref()
                .is_some_and(|k| Some(k) == guest_key),
            _ => false,
        }
    }
}

/// A stored message.
///
/// `content` depends on `role`: `{"text"}` for user and assistant text,
/// `{"id", "name", "input"}` for a tool call, and
/// `{"tool_use_id", "content", "is_error"}` for its result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub chat_session_id: ChatSessionId,
    pub role: ChatRole,
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: Option<UserId>, guest_key: Option<&str>) -> ChatSession {
        ChatSession {
            id: ChatSessionId::new(1),
            user_id,
            guest_key: guest_key.map(str::to_owned),
            title: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_session_ownership() {
        let s = session(Some(UserId::new(7)), None);
        assert!(s.is_owned_by(Some(UserId::new(7)), None));
        assert!(!s.is_owned_by(Some(UserId::new(8)), None));
        assert!(!s.is_owned_by(None, Some("abc")));
    }

    #[test]
    fn test_guest_session_ownership() {
        let s = session(None, Some("abc"));
        assert!(s.is_owned_by(None, Some("abc")));
        assert!(!s.is_owned_by(None, Some("xyz")));
        assert!(!s.is_owned_by(None, None));
        assert!(!s.is_owned_by(Some(UserId::new(1)), Some("abc")));
    }

    #[test]
    fn test_guest_key_not_serialized() {
        let json = serde_json::to_string(&session(None, Some("secret-key"))).expect("serialize");
        assert!(!json.contains("secret-key"));
    }
}
