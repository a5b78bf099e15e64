//! parallel-tool-use
//!
//! A tool-calling LLM agent served over HTTP. The agent answers questions
//! about companies by calling a stock-price tool and a news-search tool,
//! executing independent calls concurrently. The crate also ships a
//! monitor for CI workflow runs.

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod tools;

#[cfg(test)]
mod testutil;
