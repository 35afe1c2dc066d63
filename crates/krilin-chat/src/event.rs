// ABOUTME: Wire codec for the chat event stream
// ABOUTME: One JSON object per data line, discriminated by its "type" field

use crate::error::Result;
use crate::models::ConversationId;
use serde::{Deserialize, Serialize};

/// Events received during a streamed chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Id assigned by the server when the turn started a new conversation.
    ConversationId { conversation_id: ConversationId },
    /// Transient progress text ("Searching...").
    Status { content: String },
    /// Fragment of the model's reasoning trace.
    Thinking { content: String },
    ToolUse {
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Fragment of the visible reply.
    Token { content: String },
    Done {
        /// Authoritative final reply; wins over accumulated tokens.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified_files: Option<Vec<String>>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

impl StreamEvent {
    /// Parse one data-line payload.
    pub fn parse(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload.trim())?)
    }

    /// Returns true if this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// Short name of the event type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::ConversationId { .. } => "conversation_id",
            StreamEvent::Status { .. } => "status",
            StreamEvent::Thinking { .. } => "thinking",
            StreamEvent::ToolUse { .. } => "tool_use",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Encode as an SSE data frame, terminated by a blank line.
    pub fn to_data_line(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
