//! Database operations for assistant chat sessions and messages.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use insightshop_core::{ChatMessageId, ChatRole, ChatSessionId, UserId};

use super::RepositoryError;
use crate::models::chat::{ChatMessage, ChatSession};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` chat session queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatSessionRow {
    id: i32,
    user_id: Option<i32>,
    guest_key: Option<String>,
    title: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChatSessionRow> for ChatSession {
    fn from(row: ChatSessionRow) -> Self {
        Self {
            id: ChatSessionId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            guest_key: row.guest_key,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for `PostgreSQL` chat message queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: i32,
    chat_session_id: i32,
    role: ChatRole,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: ChatMessageId::new(row.id),
            chat_session_id: ChatSessionId::new(row.chat_session_id),
            role: row.role,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chat database operations.
pub struct ChatRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> ChatRepository<'c> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Create a new chat session owned by a user or a guest key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_session(
        &mut self,
        user_id: Option<UserId>,
        guest_key: Option<&str>,
    ) -> Result<ChatSession, RepositoryError> {
        let row = sqlx::query_as::<_, ChatSessionRow>(
            r"
            INSERT INTO insightshop.chat_session (user_id, guest_key)
            VALUES ($1, $2)
            RETURNING id, user_id, guest_key, title, created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(guest_key)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Get a chat session by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_session(
        &mut self,
        id: ChatSessionId,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ChatSessionRow>(
            r"
            SELECT id, user_id, guest_key, title, created_at, updated_at
            FROM insightshop.chat_session
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List a user's chat sessions, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_sessions(&mut self, user_id: UserId) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatSessionRow>(
            r"
            SELECT id, user_id, guest_key, title, created_at, updated_at
            FROM insightshop.chat_session
            WHERE user_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update a session's title.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the session doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_session_title(
        &mut self,
        id: ChatSessionId,
        title: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE insightshop.chat_session SET title = $1 WHERE id = $2")
            .bind(title)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Add a message to a chat session and bump the session's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_message(
        &mut self,
        chat_session_id: ChatSessionId,
        role: ChatRole,
        content: &serde_json::Value,
    ) -> Result<ChatMessage, RepositoryError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            r"
            INSERT INTO insightshop.chat_message (chat_session_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, chat_session_id, role, content, created_at
            ",
        )
        .bind(chat_session_id)
        .bind(role)
        .bind(content)
        .fetch_one(&mut *self.conn)
        .await?;

        sqlx::query("UPDATE insightshop.chat_session SET updated_at = NOW() WHERE id = $1")
            .bind(chat_session_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(row.into())
    }

    /// Get all messages for a chat session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_messages(
        &mut self,
        chat_session_id: ChatSessionId,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r"
            SELECT id, chat_session_id, role, content, created_at
            FROM insightshop.chat_message
            WHERE chat_session_id = $1
            ORDER BY id
            ",
        )
        .bind(chat_session_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
