// ABOUTME: HTTP client for the chat backend's streaming endpoint
// ABOUTME: Sends one turn and drives the event-stream response into the assembler

use crate::assembler::{StreamingReplyAssembler, TurnOutcome};
use crate::error::{ChatError, Result};
use crate::models::{ConversationId, Message, Role};
use crate::stream::{drive_turn, DeltaSink};
use reqwest::header::ACCEPT;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Explicit auth/session context handed to the client by its caller.
#[derive(Clone)]
pub struct SessionContext {
    pub api_url: Url,
    pub token: Option<String>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("api_url", &self.api_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Prior message as sent back to the backend for context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// Body of the send-message call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl SendMessageRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            history: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_history(mut self, messages: &[Message]) -> Self {
        self.history = messages.iter().map(HistoryEntry::from).collect();
        self
    }

    pub fn with_conversation_id(mut self, id: Option<ConversationId>) -> Self {
        self.conversation_id = id;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Client for the backend chat endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    context: SessionContext,
    chat_path: String,
}

impl ChatClient {
    pub fn new(context: SessionContext, chat_path: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("krilin-chat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            context,
            chat_path: chat_path.into(),
        })
    }

    /// Full URL of the streaming endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        let mut base = self.context.api_url.clone();
        // Url::join replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(self.chat_path.trim_start_matches('/'))
            .map_err(|e| ChatError::Config(format!("Invalid chat path {:?}: {}", self.chat_path, e)))
    }

    /// POST the turn and return the response once the server accepted it.
    ///
    /// Any non-2xx status is reported before streaming starts.
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<reqwest::Response> {
        let url = self.endpoint()?;
        debug!(%url, history = request.history.len(), "Sending chat message");

        let mut builder = self
            .http
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(request);
        if let Some(token) = &self.context.token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp)
    }

    /// Run one full turn: append the user message, send it with the prior
    /// transcript as history, and stream the reply into `assembler`.
    ///
    /// If the request fails before streaming starts the turn is closed with
    /// the failure reply and the error is returned.
    pub async fn stream_turn<K>(
        &self,
        assembler: &mut StreamingReplyAssembler,
        text: &str,
        attachments: Vec<String>,
        sink: &mut K,
    ) -> Result<TurnOutcome>
    where
        K: DeltaSink + ?Sized,
    {
        let request = SendMessageRequest::new(text)
            .with_history(assembler.transcript().messages())
            .with_conversation_id(assembler.conversation_id().cloned())
            .with_attachments(attachments);

        assembler.begin_turn(text);

        let response = match self.send_message(&request).await {
            Ok(response) => response,
            Err(e) => {
                let delta = assembler.fail_turn(e.to_string());
                sink.on_delta(&delta, assembler);
                return Err(e);
            }
        };

        let outcome = drive_turn(assembler, response.bytes_stream(), sink).await?;
        info!(?outcome, conversation = ?assembler.conversation_id(), "Turn finished");
        Ok(outcome)
    }
}
