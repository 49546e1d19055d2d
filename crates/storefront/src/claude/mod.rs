//! Claude Messages API client for the shopping assistant.
//!
//! Non-streaming only: the assistant runs a bounded tool-use loop and needs
//! each complete response before deciding whether to continue.

mod client;
mod error;
pub mod types;

pub use client::ClaudeClient;
pub use error::ClaudeError;
pub use types::{ChatResponse, ContentBlock, Message, MessageContent, Role, StopReason, Tool};
