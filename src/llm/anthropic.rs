//! Anthropic Messages API client.

use super::{map_send_error, ChatModel, LlmError, Message, ModelInfo, ModelReply, ToolCall};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// The Messages API accepts temperatures in `0.0..=1.0`.
pub const MAX_TEMPERATURE: f32 = 1.0;

/// Settings for the Anthropic client.
#[derive(Clone)]
pub struct AnthropicSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl fmt::Debug for AnthropicSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicSettings {
    pub fn new(base_url: String, api_key: String, model: String, temperature: f32) -> Self {
        let clamped = temperature.clamp(0.0, MAX_TEMPERATURE);
        if clamped != temperature {
            warn!(
                "Temperature {} is outside Anthropic's range, using {}",
                temperature, clamped
            );
        }
        Self {
            base_url,
            api_key,
            model,
            temperature: clamped,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_seconds: 120,
        }
    }
}

/// Chat model backed by Anthropic's Messages API.
pub struct AnthropicChat {
    settings: AnthropicSettings,
    http_client: reqwest::Client,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    #[serde(other)]
    Unknown,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Convert the history into Anthropic's layout.
///
/// System messages move to the top-level `system` field and tool results
/// travel inside user turns; consecutive blocks of one role are merged
/// because the API requires alternating roles.
fn to_wire(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system: Vec<&str> = Vec::new();
    let mut wire: Vec<WireMessage> = Vec::new();

    for message in messages {
        let (role, blocks) = match message {
            Message::System { content } => {
                system.push(content);
                continue;
            }
            Message::User { content } => (
                "user",
                vec![ContentBlock::Text {
                    text: content.clone(),
                }],
            ),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
                if !content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: content.clone(),
                    });
                }
                blocks.extend(tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    input: call.function.arguments.clone(),
                }));
                ("assistant", blocks)
            }
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => (
                "user",
                vec![ContentBlock::ToolResult {
                    tool_use_id: tool_call_id.clone(),
                    content: content.clone(),
                }],
            ),
        };

        match wire.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => wire.push(WireMessage {
                role,
                content: blocks,
            }),
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, wire)
}

fn from_wire(response: MessagesResponse) -> ModelReply {
    let mut reply = ModelReply::default();
    for block in response.content {
        match block {
            ContentBlock::Text { text } => reply.content.push_str(&text),
            ContentBlock::ToolUse { id, name, input } => {
                reply.tool_calls.push(ToolCall::new(id, name, input))
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
        }
    }
    reply
}

impl AnthropicChat {
    pub fn new(settings: AnthropicSettings) -> Result<Self, LlmError> {
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
impl ChatModel for AnthropicChat {
    fn describe(&self) -> ModelInfo {
        ModelInfo {
            provider: "anthropic",
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
        let (system, wire_messages) = to_wire(messages);
        let request = MessagesRequest {
            model: &settings.model,
            max_tokens: settings.max_tokens,
            system,
            messages: wire_messages,
            tools: tools
                .iter()
                .map(|t| WireTool {
                    name: &t.function.name,
                    description: &t.function.description,
                    input_schema: &t.function.parameters,
                })
                .collect(),
            temperature: settings.temperature,
        };

        let url = format!("{}/v1/messages", settings.base_url.trim_end_matches('/'));
        debug!("Sending anthropic request with {} messages", messages.len());

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, settings.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "anthropic",
                status,
                body,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| LlmError::Decode {
            provider: "anthropic",
            message: e.to_string(),
        })?;

        debug!("Anthropic stop reason: {:?}", parsed.stop_reason);
        Ok(from_wire(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::spawn_mock;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_tool_results_merge_into_one_user_turn() {
        let history = vec![
            Message::system("Be brief."),
            Message::user("Compare NVDA and AAPL"),
            Message::assistant(
                "Looking up both.",
                vec![
                    ToolCall::new("t1", "get_stock_price", json!({"symbol": "NVDA"})),
                    ToolCall::new("t2", "get_stock_price", json!({"symbol": "AAPL"})),
                ],
            ),
            Message::tool("t1", "get_stock_price", "120.5"),
            Message::tool("t2", "get_stock_price", "150.0"),
        ];

        let (system, wire) = to_wire(&history);
        assert_eq!(system.as_deref(), Some("Be brief."));
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].role, "assistant");
        assert_eq!(wire[1].content.len(), 3);
        assert_eq!(wire[2].role, "user");
        assert_eq!(
            wire[2].content,
            vec![
                ContentBlock::ToolResult {
                    tool_use_id: "t1".to_string(),
                    content: "120.5".to_string()
                },
                ContentBlock::ToolResult {
                    tool_use_id: "t2".to_string(),
                    content: "150.0".to_string()
                },
            ]
        );
    }

    async fn messages(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("ak-test") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"type": "error"})));
        }
        assert_eq!(body["tools"][0]["name"], "get_recent_company_news");
        (
            StatusCode::OK,
            Json(json!({
                "content": [
                    {"type": "text", "text": "Let me search."},
                    {"type": "tool_use", "id": "toolu_1", "name": "get_recent_company_news", "input": {"company_name": "Apple"}}
                ],
                "stop_reason": "tool_use"
            })),
        )
    }

    fn news_tool() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            tool_type: "function".to_string(),
            function: crate::tools::FunctionDefinition {
                name: "get_recent_company_news".to_string(),
                description: "news".to_string(),
                parameters: json!({"type": "object"}),
            },
        }]
    }

    #[tokio::test]
    async fn test_invoke_parses_tool_use() {
        let base = spawn_mock(Router::new().route("/v1/messages", post(messages))).await;
        let model = AnthropicChat::new(AnthropicSettings::new(
            base,
            "ak-test".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            0.7,
        ))
        .unwrap();

        let reply = model
            .invoke(&[Message::user("Apple news?")], &news_tool())
            .await
            .unwrap();

        assert_eq!(reply.content, "Let me search.");
        assert_eq!(
            reply.tool_calls,
            vec![ToolCall::new(
                "toolu_1",
                "get_recent_company_news",
                json!({"company_name": "Apple"})
            )]
        );
    }

    #[test]
    fn test_temperature_clamped_to_anthropic_range() {
        let settings = |t| {
            AnthropicSettings::new(
                "http://localhost".to_string(),
                "ak-test".to_string(),
                "claude".to_string(),
                t,
            )
        };
        assert_eq!(settings(1.5).temperature, 1.0);
        assert_eq!(settings(2.0).temperature, 1.0);
        assert_eq!(settings(0.7).temperature, 0.7);
    }

    #[test]
    fn test_unknown_blocks_are_ignored() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "thinking", "thinking": "hmm"}, {"type": "text", "text": "ok"}]
        }))
        .unwrap();
        assert_eq!(from_wire(response), ModelReply::text("ok"));
    }
}
