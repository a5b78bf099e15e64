//! OpenAI Chat Completions client.
//!
//! Also serves Azure OpenAI deployments and the Hugging Face router, which
//! speak the same wire format behind a different URL and auth header.

use super::{map_send_error, ChatModel, LlmError, Message, ModelInfo, ModelReply, ToolCall};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// How the API key is presented to the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <key>` (OpenAI, Hugging Face).
    Bearer(String),
    /// `api-key: <key>` (Azure OpenAI).
    ApiKeyHeader(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::ApiKeyHeader(_) => f.write_str("ApiKeyHeader(<redacted>)"),
        }
    }
}

/// Settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// Shown in logs and errors.
    pub provider: &'static str,
    /// Full URL of the chat completions endpoint.
    pub endpoint: String,
    pub auth: Auth,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

/// Chat model speaking the OpenAI Chat Completions protocol.
pub struct OpenAiChat {
    settings: OpenAiSettings,
    http_client: reqwest::Client,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<WireToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunction,
}

/// Arguments travel as a JSON-encoded string.
#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

fn function_type() -> String {
    "function".to_string()
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

fn to_wire(message: &Message) -> WireMessage {
    match message {
        Message::System { content } => WireMessage::System {
            content: content.clone(),
        },
        Message::User { content } => WireMessage::User {
            content: content.clone(),
        },
        Message::Assistant {
            content,
            tool_calls,
        } => WireMessage::Assistant {
            content: (!content.is_empty()).then(|| content.clone()),
            tool_calls: (!tool_calls.is_empty()).then(|| {
                tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        call_type: function_type(),
                        function: WireFunction {
                            name: call.function.name.clone(),
                            arguments: call.function.arguments.to_string(),
                        },
                    })
                    .collect()
            }),
        },
        Message::Tool {
            tool_call_id,
            content,
            ..
        } => WireMessage::Tool {
            tool_call_id: tool_call_id.clone(),
            content: content.clone(),
        },
    }
}

fn from_wire(call: WireToolCall) -> ToolCall {
    let arguments = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments).unwrap_or_else(|e| {
            warn!(
                "Tool call {} has malformed arguments ({}), passing them through as a string",
                call.function.name, e
            );
            Value::String(call.function.arguments.clone())
        })
    };
    ToolCall::new(call.id, call.function.name, arguments)
}

impl OpenAiChat {
    pub fn new(settings: OpenAiSettings) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            settings,
            http_client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn describe(&self) -> ModelInfo {
        ModelInfo {
            provider: self.settings.provider,
            model_name: self.settings.model.clone(),
            temperature: self.settings.temperature,
        }
    }

    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError> {
        let settings = &self.settings;
        let request = ChatCompletionRequest {
            model: &settings.model,
            messages: messages.iter().map(to_wire).collect(),
            tools,
            temperature: settings.temperature,
        };

        debug!(
            "Sending {} chat request with {} messages",
            settings.provider,
            messages.len()
        );

        let builder = self.http_client.post(&settings.endpoint).json(&request);
        let builder = match &settings.auth {
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::ApiKeyHeader(key) => builder.header("api-key", key),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(e, &settings.endpoint, settings.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: settings.provider,
                status,
                body,
            });
        }

        let completion: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::Decode {
                provider: settings.provider,
                message: e.to_string(),
            })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Decode {
                provider: settings.provider,
                message: "response contained no choices".to_string(),
            })?
            .message;

        Ok(ModelReply {
            content: message.content.unwrap_or_default(),
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(from_wire)
                .collect(),
        })
    }
}
