//! Chat orchestration for the shopping assistant.
//!
//! A turn:
//! 1. Load or create the conversation and save the shopper's message
//! 2. Extract intent and search the catalog
//! 3. Ask Claude, with the results and the caller's permitted tools, running
//!    each requested tool through the executor
//! 4. Without Claude, or when it fails, answer from the results directly

use askama::Template;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{info, instrument, warn};

use insightshop_core::{ChatRole, ChatSessionId, UserId};

use crate::claude::{ClaudeClient, ClaudeError, ContentBlock, Message, MessageContent, Role, StopReason};
use crate::config::CommerceConfig;
use crate::db::{ChatRepository, RepositoryError, SaleRepository};
use crate::embeddings::EmbeddingClient;
use crate::models::{ChatMessage, ChatSession};

use super::intent::{ShoppingIntent, extract_intent};
use super::matching::{MatchSuggestion, recommend_matches};
use super::reply::compose_reply;
use super::search::{AssistantSearch, ProductResult};
use super::tools::{ToolContext, ToolExecutor, ToolRegistry, rejection};

/// Maximum number of tool use iterations per turn.
const MAX_TOOL_ITERATIONS: usize = 5;

/// Products returned per turn.
const PRODUCT_LIMIT: usize = 8;

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Template)]
#[template(path = "assistant/system_prompt.txt")]
struct SystemPrompt<'a> {
    today: NaiveDate,
    signed_in: bool,
    is_admin: bool,
    products: &'a [ProductResult],
    relaxed: &'a [&'static str],
    suggestions: &'a [MatchSuggestion],
}

/// Errors that can occur in the chat service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Claude API error: {0}")]
    Claude(#[from] ClaudeError),

    #[error("session not found")]
    SessionNotFound,

    #[error("{0}")]
    InvalidMessage(String),

    #[error("too many tool iterations")]
    TooManyToolIterations,
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.into())
    }
}

/// Who is chatting.
#[derive(Debug, Clone, Copy)]
pub struct ChatCaller<'a> {
    pub tools: ToolContext,
    /// Conversation handle kept in a guest's HTTP session.
    pub guest_key: Option<&'a str>,
}

impl ChatCaller<'_> {
    const fn user_id(&self) -> Option<UserId> {
        self.tools.user_id
    }

    fn owns(&self, session: &ChatSession) -> bool {
        session.is_owned_by(self.user_id(), self.guest_key)
    }
}

/// A tool the model ran during a turn.
#[derive(Debug, Clone, Serialize)]
pub struct ToolAction {
    pub tool: String,
    pub input: Value,
    pub success: bool,
}

/// Response to one chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: ChatSessionId,
    pub reply: String,
    pub intent: ShoppingIntent,
    pub products: Vec<ProductResult>,
    pub suggestions: Vec<MatchSuggestion>,
    pub actions: Vec<ToolAction>,
    /// Filters dropped to find products.
    pub relaxed_filters: Vec<&'static str>,
}

/// Chat service for the shopping assistant.
pub struct ChatService<'a> {
    pool: &'a PgPool,
    claude: Option<&'a ClaudeClient>,
    embeddings: Option<&'a EmbeddingClient>,
    registry: &'a ToolRegistry,
    commerce: CommerceConfig,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        claude: Option<&'a ClaudeClient>,
        embeddings: Option<&'a EmbeddingClient>,
        registry: &'a ToolRegistry,
        commerce: CommerceConfig,
    ) -> Self {
        Self {
            pool,
            claude,
            embeddings,
            registry,
            commerce,
        }
    }

    async fn conn(&self) -> Result<PoolConnection<Postgres>, ChatError> {
        Ok(self.pool.acquire().await?)
    }

    /// A conversation, if `caller` owns it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionNotFound` for missing or foreign sessions.
    pub async fn session(
        &self,
        caller: &ChatCaller<'_>,
        session_id: ChatSessionId,
    ) -> Result<ChatSession, ChatError> {
        let mut conn = self.conn().await?;
        ChatRepository::new(&mut conn)
            .get_session(session_id)
            .await?
            .filter(|s| caller.owns(s))
            .ok_or(ChatError::SessionNotFound)
    }

    /// A signed-in user's conversations, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Database` if the query fails.
    pub async fn sessions(&self, user_id: UserId) -> Result<Vec<ChatSession>, ChatError> {
        let mut conn = self.conn().await?;
        Ok(ChatRepository::new(&mut conn).list_sessions(user_id).await?)
    }

    /// Messages of a conversation `caller` owns.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionNotFound` for missing or foreign sessions.
    pub async fn messages(
        &self,
        caller: &ChatCaller<'_>,
        session_id: ChatSessionId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let session = self.session(caller, session_id).await?;
        let mut conn = self.conn().await?;
        Ok(ChatRepository::new(&mut conn).get_messages(session.id).await?)
    }

    /// Run one chat turn.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidMessage` for empty or oversized messages,
    /// `ChatError::SessionNotFound` for a session the caller doesn't own, and
    /// `ChatError::Database` if a query fails. Claude failures are logged and
    /// answered with a reply built from the search results.
    #[instrument(skip(self, caller, message), fields(caller = ?caller.tools.caller))]
    pub async fn send_message(
        &self,
        caller: &ChatCaller<'_>,
        session_id: Option<ChatSessionId>,
        message: &str,
    ) -> Result<ChatReply, ChatError> {
        let message = validate_message(message)?;
        let today = caller.tools.today;

        let mut conn = self.conn().await?;
        let session = match session_id {
            Some(id) => ChatRepository::new(&mut conn)
                .get_session(id)
                .await?
                .filter(|s| caller.owns(s))
                .ok_or(ChatError::SessionNotFound)?,
            None => {
                let mut chats = ChatRepository::new(&mut conn);
                let session = chats
                    .create_session(caller.user_id(), caller.guest_key)
                    .await?;
                chats
                    .update_session_title(session.id, &generate_title(message))
                    .await?;
                session
            }
        };
        ChatRepository::new(&mut conn)
            .add_message(session.id, ChatRole::User, &json!({ "text": message }))
            .await?;

        let intent = extract_intent(message);
        let outcome = AssistantSearch::new(self.embeddings)
            .search(&mut conn, &intent, message, PRODUCT_LIMIT)
            .await?;
        let sales = SaleRepository::new(&mut conn).list_active(today).await?;
        let products: Vec<ProductResult> = outcome
            .hits
            .iter()
            .map(|hit| hit.to_result(&sales, today))
            .collect();

        let mut suggestions = Vec::new();
        if intent.wants_matches
            && let Some(anchor) = outcome.hits.first()
        {
            suggestions = recommend_matches(&mut conn, &anchor.product, today).await?;
        }
        drop(conn);

        let mut actions = Vec::new();
        let llm_reply = match self.claude {
            Some(claude) => {
                let prompt = SystemPrompt {
                    today,
                    signed_in: caller.user_id().is_some(),
                    is_admin: caller.tools.caller.is_admin(),
                    products: &products,
                    relaxed: &outcome.relaxed,
                    suggestions: &suggestions,
                };
                match self
                    .run_claude(claude, caller, session.id, &prompt, &mut actions)
                    .await
                {
                    Ok(text) if !text.trim().is_empty() => Some(text),
                    Ok(_) => None,
                    Err(ChatError::Claude(e)) if !e.is_transient() => {
                        tracing::error!(error = %e, "Claude request rejected, using composed reply");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "Claude unavailable, using composed reply");
                        None
                    }
                }
            }
            None => None,
        };

        let reply = match llm_reply {
            Some(text) => text,
            None => {
                let text = compose_reply(&intent, &products, &outcome.relaxed, &suggestions);
                let mut conn = self.conn().await?;
                ChatRepository::new(&mut conn)
                    .add_message(session.id, ChatRole::Assistant, &json!({ "text": text }))
                    .await?;
                text
            }
        };

        Ok(ChatReply {
            session_id: session.id,
            reply,
            intent,
            products,
            suggestions,
            actions,
            relaxed_filters: outcome.relaxed,
        })
    }

    /// The Claude tool-use loop. Returns the final text.
    async fn run_claude(
        &self,
        claude: &ClaudeClient,
        caller: &ChatCaller<'_>,
        session_id: ChatSessionId,
        prompt: &SystemPrompt<'_>,
        actions: &mut Vec<ToolAction>,
    ) -> Result<String, ChatError> {
        let history = {
            let mut conn = self.conn().await?;
            ChatRepository::new(&mut conn).get_messages(session_id).await?
        };
        let mut messages = convert_to_claude_messages(&history);
        let system = render_system_prompt(prompt);
        let tools = self.registry.tools_for(caller.tools.caller);
        let executor = ToolExecutor::new(self.pool, self.registry, self.commerce);

        let mut final_text = String::new();
        for _ in 0..MAX_TOOL_ITERATIONS {
            let response = claude
                .chat(messages.clone(), Some(system.clone()), Some(tools.clone()))
                .await?;
            info!(
                stop_reason = ?response.stop_reason,
                content_blocks = response.content.len(),
                "Claude response received"
            );

            let mut tool_results: Vec<ContentBlock> = Vec::new();
            for block in &response.content {
                match block {
                    ContentBlock::Text { text } => {
                        self.store(session_id, ChatRole::Assistant, &json!({ "text": text }))
                            .await?;
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        self.store(
                            session_id,
                            ChatRole::ToolUse,
                            &json!({ "id": id, "name": name, "input": input }),
                        )
                        .await?;

                        let result = match executor.execute(name, input, &caller.tools).await {
                            Ok(value) => value,
                            Err(rejected) => {
                                warn!(tool = %name, error = %rejected, "Tool call rejected");
                                rejection(&rejected)
                            }
                        };
                        let success = result.get("success").and_then(Value::as_bool) == Some(true);
                        actions.push(ToolAction {
                            tool: name.clone(),
                            input: input.clone(),
                            success,
                        });

                        let content = result.to_string();
                        self.store(
                            session_id,
                            ChatRole::ToolResult,
                            &json!({ "tool_use_id": id, "content": content, "is_error": !success }),
                        )
                        .await?;
                        tool_results.push(ContentBlock::ToolResult {
                            tool_use_id: id.clone(),
                            content,
                            is_error: Some(!success),
                        });
                    }
                    ContentBlock::ToolResult { .. } => {}
                }
            }
            final_text = response.text();

            if tool_results.is_empty() || response.stop_reason != Some(StopReason::ToolUse) {
                return Ok(final_text);
            }
            messages.push(Message {
                role: Role::Assistant,
                content: MessageContent::Blocks(response.content.clone()),
            });
            messages.push(Message {
                role: Role::User,
                content: MessageContent::Blocks(tool_results),
            });
        }

        warn!("Too many tool iterations, stopping");
        if final_text.trim().is_empty() {
            Err(ChatError::TooManyToolIterations)
        } else {
            Ok(final_text)
        }
    }

    async fn store(&self, session_id: ChatSessionId, role: ChatRole, content: &Value) -> Result<(), ChatError> {
        let mut conn = self.conn().await?;
        ChatRepository::new(&mut conn)
            .add_message(session_id, role, content)
            .await?;
        Ok(())
    }
}

fn render_system_prompt(prompt: &SystemPrompt<'_>) -> String {
    prompt.render().unwrap_or_else(|e| {
        warn!(error = %e, "System prompt failed to render");
        String::from("You are a helpful shopping assistant for an online clothing store.")
    })
}

fn validate_message(message: &str) -> Result<&str, ChatError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidMessage("message cannot be empty".to_owned()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::InvalidMessage(format!(
            "message must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

/// State for building Claude messages from stored messages.
struct MessageBuilder {
    result: Vec<Message>,
    assistant_blocks: Vec<ContentBlock>,
    tool_results: Vec<ContentBlock>,
}

impl MessageBuilder {
    const fn new() -> Self {
        Self {
            result: Vec::new(),
            assistant_blocks: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    fn flush_assistant_blocks(&mut self) {
        if !self.assistant_blocks.is_empty() {
            self.result.push(Message {
                role: Role::Assistant,
                content: MessageContent::Blocks(std::mem::take(&mut self.assistant_blocks)),
            });
        }
    }

    fn flush_tool_results(&mut self) {
        if !self.tool_results.is_empty() {
            self.result.push(Message {
                role: Role::User,
                content: MessageContent::Blocks(std::mem::take(&mut self.tool_results)),
            });
        }
    }

    fn add_user_message(&mut self, msg: &ChatMessage) {
        self.flush_assistant_blocks();
        self.flush_tool_results();
        self.result
            .push(Message::user_text(json_str(&msg.content, "text")));
    }

    fn add_assistant_message(&mut self, msg: &ChatMessage) {
        self.flush_tool_results();
        self.assistant_blocks.push(ContentBlock::Text {
            text: json_str(&msg.content, "text"),
        });
    }

    fn add_tool_use(&mut self, msg: &ChatMessage) {
        self.flush_tool_results();
        self.assistant_blocks.push(ContentBlock::ToolUse {
            id: json_str(&msg.content, "id"),
            name: json_str(&msg.content, "name"),
            input: msg.content.get("input").cloned().unwrap_or(Value::Null),
        });
    }

    fn add_tool_result(&mut self, msg: &ChatMessage) {
        self.flush_assistant_blocks();
        self.tool_results.push(ContentBlock::ToolResult {
            tool_use_id: json_str(&msg.content, "tool_use_id"),
            content: json_str(&msg.content, "content"),
            is_error: msg.content.get("is_error").and_then(Value::as_bool),
        });
    }

    fn finish(mut self) -> Vec<Message> {
        self.flush_assistant_blocks();
        self.flush_tool_results();
        self.result
    }
}

/// A string field of stored content, empty if missing.
fn json_str(content: &Value, key: &str) -> String {
    content
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_owned()
}

/// Convert stored messages to the Claude message format.
///
/// Consecutive assistant text and tool-use rows become one assistant message;
/// consecutive tool results become one user message.
fn convert_to_claude_messages(messages: &[ChatMessage]) -> Vec<Message> {
    let mut builder = MessageBuilder::new();
    for msg in messages {
        match msg.role {
            ChatRole::User => builder.add_user_message(msg),
            ChatRole::Assistant => builder.add_assistant_message(msg),
            ChatRole::ToolUse => builder.add_tool_use(msg),
            ChatRole::ToolResult => builder.add_tool_result(msg),
        }
    }
    builder.finish()
}

/// Session title from the first message.
fn generate_title(message: &str) -> String {
    const MAX_TITLE_LENGTH: usize = 50;

    let trimmed = message.trim();
    if trimmed.chars().count() <= MAX_TITLE_LENGTH {
        return trimmed.to_owned();
    }
    let truncated: String = trimmed.chars().take(MAX_TITLE_LENGTH).collect();
    truncated.rfind(' ').map_or_else(
        || format!("{truncated}..."),
        |space| format!("{}...", truncated.get(..space).unwrap_or(&truncated)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use insightshop_core::ChatMessageId;

    use super::*;

    fn stored(id: i32, role: ChatRole, content: Value) -> ChatMessage {
        ChatMessage {
            id: ChatMessageId::new(id),
            chat_session_id: ChatSessionId::new(1),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_title_short() {
        assert_eq!(generate_title("  red dress for a wedding "), "red dress for a wedding");
    }

    #[test]
    fn test_generate_title_long() {
        let title = generate_title(
            "I need a navy blazer and matching trousers for a job interview next week please",
        );
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= 53);
        assert!(!title.contains("please"));
    }

    #[test]
    fn test_validate_message() {
        assert_eq!(validate_message("  hi  ").unwrap(), "hi");
        assert!(matches!(validate_message("   "), Err(ChatError::InvalidMessage(_))));
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(validate_message(&long), Err(ChatError::InvalidMessage(_))));
    }

    #[test]
    fn test_history_groups_tool_turns() {
        let history = vec![
            stored(1, ChatRole::User, json!({"text": "add the wrap dress"})),
            stored(2, ChatRole::Assistant, json!({"text": "Adding it now."})),
            stored(
                3,
                ChatRole::ToolUse,
                json!({"id": "toolu_1", "name": "cart_add_item", "input": {"product_id": 4, "quantity": 1}}),
            ),
            stored(
                4,
                ChatRole::ToolResult,
                json!({"tool_use_id": "toolu_1", "content": "{\"success\":true}", "is_error": false}),
            ),
            stored(5, ChatRole::Assistant, json!({"text": "Done!"})),
        ];

        let messages = convert_to_claude_messages(&history);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );

        match &messages[1].content {
            MessageContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "cart_add_item"));
            }
            MessageContent::Text(_) => panic!("expected blocks"),
        }
        match &messages[2].content {
            MessageContent::Blocks(blocks) => assert!(matches!(
                &blocks[0],
                ContentBlock::ToolResult { is_error: Some(false), .. }
            )),
            MessageContent::Text(_) => panic!("expected tool results"),
        }
    }

    #[test]
    fn test_system_prompt_lists_context() {
        let prompt = SystemPrompt {
            today: NaiveDate::from_ymd_opt(2025, 11, 28).unwrap(),
            signed_in: false,
            is_admin: false,
            products: &[],
            relaxed: &["color"],
            suggestions: &[],
        };
        let text = prompt.render().unwrap();
        assert!(text.contains("Today is 2025-11-28."));
        assert!(text.contains("browsing as a guest"));
        assert!(text.contains("No catalog products matched"));
        assert!(text.contains("these filters were dropped: color"));
    }
}
