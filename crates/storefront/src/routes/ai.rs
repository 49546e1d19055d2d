//! Shopping assistant route handlers.
//!
//! Chat is open to guests. A guest's conversations are bound to a random key
//! in their HTTP session, so they can't read other visitors' history.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use insightshop_core::{ChatSessionId, ToolPermission};

use crate::assistant::{ChatCaller, ChatReply, ChatService, ToolContext, ToolExecutor};
use crate::error::Result;
use crate::middleware::{OptionalUser, RequireUser, guest_chat_key};
use crate::models::{ChatMessage, ChatSession, CurrentUser};
use crate::state::AppState;

/// Build the assistant router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ai/chat", post(chat))
        .route("/api/ai/sessions", get(sessions))
        .route("/api/ai/sessions/{id}/messages", get(messages))
        .route("/api/ai/tools", get(list_tools))
        .route("/api/ai/tools/execute", post(execute_tool))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<ChatSessionId>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub tool: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    json!({})
}

/// A catalog entry as shown to the caller.
#[derive(Debug, Serialize)]
pub struct ToolInfo<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub permission: ToolPermission,
    pub input_schema: &'a Value,
}

fn tool_context(user: Option<&CurrentUser>) -> ToolContext {
    let now = Utc::now();
    user.map_or_else(
        || ToolContext::guest(now),
        |u| ToolContext::new(u.role(), Some(u.id), now),
    )
}

/// Guests need a conversation key; signed-in users don't.
async fn guest_key(session: &Session, user: Option<&CurrentUser>) -> Result<Option<String>> {
    Ok(match user {
        Some(_) => None,
        None => Some(guest_chat_key(session).await?),
    })
}

fn service(state: &AppState) -> ChatService<'_> {
    ChatService::new(
        state.pool(),
        state.claude(),
        state.embeddings(),
        state.tools(),
        state.config().commerce,
    )
}

/// POST /api/ai/chat
#[instrument(skip_all)]
async fn chat(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>> {
    let key = guest_key(&session, user.as_ref()).await?;
    let caller = ChatCaller {
        tools: tool_context(user.as_ref()),
        guest_key: key.as_deref(),
    };
    let reply = service(&state)
        .send_message(&caller, body.session_id, &body.message)
        .await?;
    Ok(Json(reply))
}

/// GET /api/ai/sessions
async fn sessions(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ChatSession>>> {
    Ok(Json(service(&state).sessions(user.id).await?))
}

/// GET /api/ai/sessions/{id}/messages
async fn messages(
    State(state): State<AppState>,
    session: Session,
    OptionalUser(user): OptionalUser,
    Path(id): Path<ChatSessionId>,
) -> Result<Json<Vec<ChatMessage>>> {
    let key = guest_key(&session, user.as_ref()).await?;
    let caller = ChatCaller {
        tools: tool_context(user.as_ref()),
        guest_key: key.as_deref(),
    };
    Ok(Json(service(&state).messages(&caller, id).await?))
}

/// Tools the caller may use.
///
/// GET /api/ai/tools
async fn list_tools(State(state): State<AppState>, user: OptionalUser) -> Json<Value> {
    let tools: Vec<ToolInfo<'_>> = state
        .tools()
        .definitions_for(user.role())
        .map(|t| ToolInfo {
            name: &t.name,
            description: &t.description,
            permission: t.permission,
            input_schema: &t.input_schema,
        })
        .collect();
    Json(json!({ "count": tools.len(), "tools": tools }))
}

/// Run a tool directly, with the same checks the chat loop applies.
///
/// POST /api/ai/tools/execute
async fn execute_tool(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Json(body): Json<ExecuteRequest>,
) -> Result<Json<Value>> {
    let ctx = tool_context(user.as_ref());
    let result = ToolExecutor::new(state.pool(), state.tools(), state.config().commerce)
        .execute(&body.tool, &body.arguments, &ctx)
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insightshop_core::{CallerRole, Email, UserId};

    use super::*;

    #[test]
    fn test_tool_context_roles() {
        assert_eq!(tool_context(None).caller, CallerRole::Guest);
        assert!(tool_context(None).user_id.is_none());

        let admin = CurrentUser {
            id: UserId::new(2),
            email: Email::parse("ops@example.com").unwrap(),
            is_admin: true,
        };
        let ctx = tool_context(Some(&admin));
        assert_eq!(ctx.caller, CallerRole::Admin);
        assert_eq!(ctx.user_id, Some(UserId::new(2)));
    }

    #[test]
    fn test_execute_request_defaults_arguments() {
        let req: ExecuteRequest =
            serde_json::from_value(json!({ "tool": "cart_view" })).unwrap();
        assert_eq!(req.arguments, json!({}));
    }
}
