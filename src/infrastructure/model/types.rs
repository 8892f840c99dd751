//! Model types - Request, Response, Stream and Error types

use crate::domain::types::{ChatMessage, ToolCall, ToolSpec};
use futures::Stream;
use reqwest::StatusCode;
use std::pin::Pin;
use thiserror::Error;

/// Chat request for a tool-calling model
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// Assistant turn returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub message: ChatMessage,
}

impl ModelResponse {
    pub fn new(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            message: ChatMessage::assistant(content, tool_calls),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, Vec::new())
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.message.tool_calls
    }
}

/// Incremental output of a streamed model turn.
///
/// Zero or more `Text` fragments are followed by exactly one `Completed`
/// carrying the assembled message.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    Text(String),
    Completed(ModelResponse),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelDelta, ModelError>> + Send>>;

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error calling model endpoint '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model endpoint '{provider}' answered HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("model endpoint '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
    #[error("model endpoint '{provider}' stream failed: {reason}")]
    Stream { provider: String, reason: String },
}

impl ModelError {
    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn status(provider: impl Into<String>, status: StatusCode, body: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status: status.as_u16(),
            body: body.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn stream(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Stream {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Short message suitable for the chat prompt.
    pub fn user_message(&self) -> String {
        match self {
            ModelError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to model endpoint '{provider}'.")
                } else if source.is_timeout() {
                    format!("Request to '{provider}' timed out.")
                } else {
                    format!("Network error talking to '{provider}'.")
                }
            }
            ModelError::Status {
                provider, status, ..
            } => match StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR) {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("Model endpoint '{provider}' rejected the credentials.")
                }
                StatusCode::NOT_FOUND => format!("Model endpoint '{provider}' was not found."),
                StatusCode::TOO_MANY_REQUESTS => {
                    format!("Model endpoint '{provider}' is rate limiting requests.")
                }
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                    format!("Model endpoint '{provider}' is currently unavailable.")
                }
                other => format!("Request to '{provider}' failed: {}", other.as_u16()),
            },
            ModelError::InvalidResponse { provider, .. } => {
                format!("Response from '{provider}' could not be understood.")
            }
            ModelError::Stream { provider, .. } => {
                format!("Streaming from '{provider}' was interrupted.")
            }
        }
    }
}
