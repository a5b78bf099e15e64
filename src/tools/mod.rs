//! Tool definitions and execution for the agent.
//!
//! This module defines the tools that the LLM can call and the executor
//! that dispatches tool calls to them.

pub mod news;
pub mod stock;

pub use news::CompanyNewsTool;
pub use stock::StockPriceTool;

use crate::config::Config;
use crate::llm::ToolCall;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised by tool implementations.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Tool definition for the function-calling APIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A function the model may elect to call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn call(&self, args: &Value) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message),
        }
    }

    /// Content handed back to the model as the tool message.
    pub fn into_content(self) -> String {
        if self.success {
            self.output
        } else {
            format!(
                "Error: {}\n Please fix your mistakes.",
                self.error.unwrap_or_default()
            )
        }
    }
}

/// The tools executor that handles tool calls.
#[derive(Default, Clone)]
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, used for the advertised definitions.
    order: Vec<String>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Definitions of every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Execute a tool call and return the result.
    pub async fn execute(&self, tool_call: &ToolCall) -> ToolResult {
        let name = &tool_call.function.name;
        let args = &tool_call.function.arguments;

        debug!("Executing tool: {} with args: {:?}", name, args);

        let Some(tool) = self.tools.get(name) else {
            return ToolResult::error(format!(
                "{} is not a valid tool, try one of [{}].",
                name,
                self.order.join(", ")
            ));
        };

        match tool.call(args).await {
            Ok(Value::String(text)) => ToolResult::success(text),
            Ok(value) => ToolResult::success(value.to_string()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or(ToolError::MissingParameter(key))
}

/// Shared HTTP client for the tool implementations.
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, ToolError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("parallel-tool-use/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Build the executor with the stock price and company news tools.
pub fn default_tools(config: &Config) -> Result<ToolExecutor, ToolError> {
    let client = http_client(config.llm.timeout_seconds)?;

    Ok(ToolExecutor::new()
        .with_tool(Arc::new(StockPriceTool::new(
            client.clone(),
            config.tools.yahoo_base_url.clone(),
        )))
        .with_tool(Arc::new(CompanyNewsTool::new(
            client,
            config.tools.tavily_base_url.clone(),
            config.tools.tavily_api_key.clone(),
        ))))
}
