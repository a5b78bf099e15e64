//! The tool-calling agent.
//!
//! This module provides the agent ⇄ tools graph and the [`Agent`] trait the
//! HTTP layer runs queries through.

pub mod graph;

pub use graph::{should_continue, AgentGraph, AgentState, GraphError, Route};

use async_trait::async_trait;
use serde::Serialize;

/// Name and tools of an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub tools: Vec<String>,
}

/// Something that answers a query by running a tool-use loop.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn tool_names(&self) -> Vec<String>;

    async fn execute(&self, query: &str) -> Result<AgentState, GraphError>;

    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name().to_string(),
            tools: self.tool_names(),
        }
    }
}

/// An [`AgentGraph`] exposed under a name.
pub struct NamedAgent {
    name: String,
    graph: AgentGraph,
}

impl NamedAgent {
    pub fn new(name: impl Into<String>, graph: AgentGraph) -> Self {
        Self {
            name: name.into(),
            graph,
        }
    }
}

#[async_trait]
impl Agent for NamedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool_names(&self) -> Vec<String> {
        self.graph.tools().names()
    }

    async fn execute(&self, query: &str) -> Result<AgentState, GraphError> {
        self.graph.invoke(query).await
    }
}
