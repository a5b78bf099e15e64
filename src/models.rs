//! Data models for the HTTP API.

use serde::{Deserialize, Serialize};

/// Returned as `result` when the final state has no messages.
pub const NO_RESPONSE: &str = "No response generated";

/// Body of `POST /run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's question.
    pub query: String,
    /// Accepted for compatibility; responses are never streamed.
    #[serde(default)]
    pub stream: bool,
}

/// Response of `POST /run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Content of the last message in the final state.
    pub result: String,
    /// Timing entries appended by the agent node.
    pub performance_log: Vec<String>,
    /// Wall-clock seconds spent on the request.
    pub total_time: f64,
}

impl QueryResponse {
    pub fn from_state(state: &crate::agent::AgentState, total_time: f64) -> Self {
        let result = state
            .last_message()
            .map(|m| m.content())
            .unwrap_or(NO_RESPONSE)
            .to_string();

        Self {
            result,
            performance_log: state.performance_log.clone(),
            total_time,
        }
    }
}

/// Endpoint paths advertised by `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub health: String,
    pub run: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            health: "/health".to_string(),
            run: "/run (POST)".to_string(),
        }
    }
}

/// Response of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Endpoints,
    pub tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentState;
    use crate::llm::Message;

    #[test]
    fn test_request_stream_defaults_to_false() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "NVDA?"}"#).unwrap();
        assert_eq!(req.query, "NVDA?");
        assert!(!req.stream);

        assert!(serde_json::from_str::<QueryRequest>(r#"{"stream": true}"#).is_err());
    }

    #[test]
    fn test_response_from_state() {
        let mut state = AgentState::from_query("NVDA?");
        state.messages.push(Message::assistant("NVDA is at 100.", vec![]));
        state
            .performance_log
            .push("[AGENT] LLM call took 0.10 seconds.".to_string());

        let resp = QueryResponse::from_state(&state, 1.5);
        assert_eq!(resp.result, "NVDA is at 100.");
        assert_eq!(resp.performance_log.len(), 1);
        assert_eq!(resp.total_time, 1.5);
    }

    #[test]
    fn test_response_without_messages() {
        let resp = QueryResponse::from_state(&AgentState::default(), 0.0);
        assert_eq!(resp.result, NO_RESPONSE);
        assert!(resp.performance_log.is_empty());
    }
}
