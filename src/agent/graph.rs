//! The agent ⇄ tools loop.
//!
//! Two nodes share one [`AgentState`]:
//! - `agent` invokes the chat model with every tool bound and appends its reply
//! - `tools` runs the tool calls of the last reply concurrently and appends
//!   one tool message per call
//!
//! Execution starts at `agent`. After `agent`, [`should_continue`] routes to
//! `tools` while the last reply requests tool calls and ends otherwise;
//! `tools` always returns to `agent`.

use crate::llm::{ChatModel, LlmError, Message};
use crate::tools::ToolExecutor;
use futures::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Node visits allowed per run before the graph gives up.
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Recursion limit of {0} reached without hitting a stop condition")]
    RecursionLimit(usize),

    #[error(transparent)]
    Model(#[from] LlmError),
}

/// State flowing through the graph. Both lists are append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentState {
    pub messages: Vec<Message>,
    pub performance_log: Vec<String>,
}

/// What a node contributes to the state.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub performance_log: Vec<String>,
}

impl AgentState {
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(query)],
            performance_log: Vec::new(),
        }
    }

    /// Merge a node's output by appending to each list.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        self.performance_log.extend(update.performance_log);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Agent,
    Tools,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Agent => f.write_str("agent"),
            Node::Tools => f.write_str("tools"),
        }
    }
}

/// Outcome of the conditional edge leaving `agent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tools,
    End,
}

/// Continue to `tools` iff the last message is a reply with tool calls.
pub fn should_continue(state: &AgentState) -> Route {
    match state.last_message() {
        Some(message @ Message::Assistant { .. }) if !message.tool_calls().is_empty() => {
            Route::Tools
        }
        _ => Route::End,
    }
}

/// The compiled two-node graph.
#[derive(Clone)]
pub struct AgentGraph {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolExecutor>,
    max_iterations: usize,
}

impl AgentGraph {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolExecutor, max_iterations: usize) -> Self {
        Self {
            model,
            tools: Arc::new(tools),
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.tools
    }

    /// The `agent` node: call the model and time it.
    async fn call_model(&self, state: &AgentState) -> Result<StateUpdate, GraphError> {
        info!("--- AGENT: Invoking LLM ---");
        let start = Instant::now();

        let reply = self
            .model
            .invoke(&state.messages, &self.tools.definitions())
            .await?;

        let log_entry = format!(
            "[AGENT] LLM call took {:.2} seconds.",
            start.elapsed().as_secs_f64()
        );
        info!("{}", log_entry);

        Ok(StateUpdate {
            messages: vec![reply.into_message()],
            performance_log: vec![log_entry],
        })
    }

    /// The `tools` node: run every requested call concurrently.
    async fn call_tools(&self, state: &AgentState) -> StateUpdate {
        let calls = state
            .last_message()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        debug!("Executing {} tool calls", calls.len());

        let results = join_all(calls.iter().map(|call| self.tools.execute(call))).await;

        let messages = calls
            .into_iter()
            .zip(results)
            .map(|(call, result)| {
                info!("Tool {} executed", call.function.name);
                Message::tool(call.id, call.function.name, result.into_content())
            })
            .collect();

        StateUpdate {
            messages,
            performance_log: Vec::new(),
        }
    }

    /// Run the graph, handing every intermediate state to `on_state`.
    ///
    /// The input state is emitted first, then the state after each node.
    pub async fn stream<F>(&self, input: AgentState, mut on_state: F) -> Result<AgentState, GraphError>
    where
        F: FnMut(&AgentState),
    {
        let mut state = input;
        on_state(&state);

        let mut node = Node::Agent;
        let mut steps = 0;

        loop {
            if steps >= self.max_iterations {
                return Err(GraphError::RecursionLimit(self.max_iterations));
            }
            steps += 1;
            debug!("Graph step {}: {}", steps, node);

            match node {
                Node::Agent => {
                    let update = self.call_model(&state).await?;
                    state.apply(update);
                    on_state(&state);

                    match should_continue(&state) {
                        Route::Tools => node = Node::Tools,
                        Route::End => break,
                    }
                }
                Node::Tools => {
                    let update = self.call_tools(&state).await;
                    state.apply(update);
                    on_state(&state);
                    node = Node::Agent;
                }
            }
        }

        Ok(state)
    }

    /// Run the graph for a single user query and return the final state.
    pub async fn invoke(&self, query: &str) -> Result<AgentState, GraphError> {
        self.stream(AgentState::from_query(query), |_| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedModel;
    use crate::llm::{ModelReply, ToolCall};
    use crate::tools::{Tool, ToolError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    /// Sleeps, then echoes the symbol back with a fixed price.
    struct SlowPrice;

    #[async_trait]
    impl Tool for SlowPrice {
        fn name(&self) -> &str {
            "get_stock_price"
        }

        fn description(&self) -> &str {
            "price"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, args: &Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!(format!("{}=100.0", args["symbol"].as_str().unwrap_or("?"))))
        }
    }

    fn price_call(id: &str, symbol: &str) -> ToolCall {
        ToolCall::new(id, "get_stock_price", json!({"symbol": symbol}))
    }

    fn graph(model: Arc<ScriptedModel>, max_iterations: usize) -> AgentGraph {
        let tools = ToolExecutor::new().with_tool(Arc::new(SlowPrice));
        AgentGraph::new(model, tools, max_iterations)
    }

    #[test]
    fn test_should_continue() {
        let mut state = AgentState::from_query("hi");
        assert_eq!(should_continue(&state), Route::End);

        state.messages.push(Message::assistant("", vec![price_call("1", "NVDA")]));
        assert_eq!(should_continue(&state), Route::Tools);

        state.messages.push(Message::tool("1", "get_stock_price", "1"));
        assert_eq!(should_continue(&state), Route::End);

        state.messages.push(Message::assistant("done", vec![]));
        assert_eq!(should_continue(&state), Route::End);
    }

    #[tokio::test]
    async fn test_ends_without_tool_calls() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply::text("Hello!")]));
        let state = graph(model.clone(), 25).invoke("hi").await.unwrap();

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.last_message().unwrap().content(), "Hello!");
        assert_eq!(state.performance_log.len(), 1);
        assert!(state.performance_log[0].starts_with("[AGENT] LLM call took "));
        assert!(state.performance_log[0].ends_with(" seconds."));
        assert_eq!(*model.calls.lock().unwrap(), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_tool_loop_runs_calls_in_parallel() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply {
                content: String::new(),
                tool_calls: vec![
                    price_call("a", "NVDA"),
                    price_call("b", "AAPL"),
                    price_call("c", "MSFT"),
                ],
            },
            ModelReply::text("All three fetched."),
        ]));

        let start = Instant::now();
        let state = graph(model.clone(), 25)
            .invoke("Compare NVDA, AAPL and MSFT")
            .await
            .unwrap();

        // Three 200ms tools running concurrently finish well under 600ms.
        assert!(start.elapsed() < Duration::from_millis(550));

        let tool_messages: Vec<_> = state
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::Tool {
                    tool_call_id,
                    content,
                    ..
                } => Some((tool_call_id.as_str(), content.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(
            tool_messages,
            vec![("a", "NVDA=100.0"), ("b", "AAPL=100.0"), ("c", "MSFT=100.0")]
        );
        assert_eq!(state.messages.len(), 6);
        assert_eq!(state.performance_log.len(), 2);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stream_emits_every_state() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply {
                content: String::new(),
                tool_calls: vec![price_call("a", "NVDA")],
            },
            ModelReply::text("done"),
        ]));

        let mut sizes = Vec::new();
        let final_state = graph(model, 25)
            .stream(AgentState::from_query("NVDA?"), |s| sizes.push(s.messages.len()))
            .await
            .unwrap();

        assert_eq!(sizes, vec![1, 2, 3, 4]);
        assert_eq!(final_state.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let replies = (0..10)
            .map(|i| ModelReply {
                content: String::new(),
                tool_calls: vec![price_call(&i.to_string(), "NVDA")],
            })
            .collect();
        let model = Arc::new(ScriptedModel::new(replies));

        let err = graph(model, 3).invoke("loop forever").await.unwrap_err();
        assert!(matches!(err, GraphError::RecursionLimit(3)));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = Arc::new(ScriptedModel::failing(LlmError::Timeout(5)));
        let err = graph(model, 25).invoke("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Request timed out after 5s");
    }
}
