//! Chat-model clients.
//!
//! This module defines the message model shared by the agent graph and the
//! provider clients, the [`ChatModel`] trait every provider implements, and
//! the [`LlmFactory`] that picks a client from configuration.

pub mod anthropic;
pub mod factory;
pub mod openai;

#[cfg(test)]
pub(crate) mod scripted;

pub use factory::{LlmFactory, Provider};

use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to a chat-model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("Missing credential for {provider}: set {variable}")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// Tool calls requested by an assistant message. Empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }
}

/// One assistant turn returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn into_message(self) -> Message {
        Message::assistant(self.content, self.tool_calls)
    }
}

/// Model settings reported by [`ChatModel::describe`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub provider: &'static str,
    pub model_name: String,
    pub temperature: f32,
}

/// A chat model that supports function calling.
///
/// Tools are bound per call: the definitions passed to [`ChatModel::invoke`]
/// are advertised to the provider with every request.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn describe(&self) -> ModelInfo;

    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError>;
}

/// Map a reqwest failure the same way for every provider.
pub(crate) fn map_send_error(err: reqwest::Error, endpoint: &str, timeout_seconds: u64) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout_seconds)
    } else if err.is_connect() {
        LlmError::Connect(endpoint.to_string())
    } else {
        LlmError::Request(err.to_string())
    }
}
