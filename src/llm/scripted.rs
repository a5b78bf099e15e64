//! A chat model that replays canned replies, for tests.

use super::{ChatModel, LlmError, Message, ModelInfo, ModelReply};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    /// Message count and tool count seen by each invocation.
    pub calls: Mutex<Vec<(usize, usize)>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn describe(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted",
            model_name: "scripted".to_string(),
            temperature: 0.0,
        }
    }

    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.len(), tools.len()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelReply::text("script exhausted")))
    }
}
