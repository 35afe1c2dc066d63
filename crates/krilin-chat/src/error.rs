// ABOUTME: Error types for krilin-chat
// ABOUTME: Separates transport, backend, stream and wire-format failures

use thiserror::Error;

/// Errors that can occur while talking to the chat backend or decoding its stream
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return ChatError::Config(err.to_string());
        }
        if let Some(status) = err.status() {
            return ChatError::Api {
                status: status.as_u16(),
                body: err.to_string(),
            };
        }
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return ChatError::Connection(err.to_string());
        }
        ChatError::Stream(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::InvalidEvent(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
