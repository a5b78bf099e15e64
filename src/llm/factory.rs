//! Provider selection.

use super::anthropic::{AnthropicChat, AnthropicSettings};
use super::openai::{Auth, OpenAiChat, OpenAiSettings};
use super::{ChatModel, LlmError};
use crate::config::Config;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "meta-llama/Llama-3.2-3B-Instruct";

/// The external LLM vendor backing the chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Azure,
    HuggingFace,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Azure => "azure",
            Provider::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "azure" => Ok(Provider::Azure),
            "huggingface" => Ok(Provider::HuggingFace),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Factory for creating chat models based on provider configuration.
pub struct LlmFactory;

impl LlmFactory {
    /// Create a chat model for `provider`, or for the configured provider when `None`.
    pub fn create(
        config: &Config,
        provider: Option<Provider>,
    ) -> Result<Arc<dyn ChatModel>, LlmError> {
        let provider = match provider {
            Some(p) => p,
            None => config.llm.provider.parse()?,
        };

        let model: Arc<dyn ChatModel> = match provider {
            Provider::OpenAi => Arc::new(Self::create_openai(config)?),
            Provider::Anthropic => Arc::new(Self::create_anthropic(config)?),
            Provider::Azure => Arc::new(Self::create_azure(config)?),
            Provider::HuggingFace => Arc::new(Self::create_huggingface(config)?),
        };

        let info = model.describe();
        info!(
            "Created {} chat model {} (temperature {})",
            info.provider, info.model_name, info.temperature
        );
        Ok(model)
    }

    fn create_openai(config: &Config) -> Result<OpenAiChat, LlmError> {
        let llm = &config.llm;
        let key = require(&llm.openai_api_key, "openai", "OPENAI_API_KEY")?;

        OpenAiChat::new(OpenAiSettings {
            provider: "openai",
            endpoint: format!(
                "{}/chat/completions",
                llm.openai_base_url.trim_end_matches('/')
            ),
            auth: Auth::Bearer(key),
            model: llm
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature: llm.temperature,
            timeout_seconds: llm.timeout_seconds,
        })
    }

    fn create_anthropic(config: &Config) -> Result<AnthropicChat, LlmError> {
        let llm = &config.llm;
        let key = require(&llm.anthropic_api_key, "anthropic", "ANTHROPIC_API_KEY")?;

        let mut settings = AnthropicSettings::new(
            llm.anthropic_base_url.clone(),
            key,
            llm.model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            llm.temperature,
        );
        settings.timeout_seconds = llm.timeout_seconds;
        AnthropicChat::new(settings)
    }

    fn create_azure(config: &Config) -> Result<OpenAiChat, LlmError> {
        let llm = &config.llm;
        let azure = &llm.azure;
        let endpoint = require(&azure.endpoint, "azure", "AZURE_OPENAI_ENDPOINT")?;
        let key = require(&azure.api_key, "azure", "AZURE_OPENAI_API_KEY")?;
        let deployment = require(
            &azure.deployment_name,
            "azure",
            "AZURE_OPENAI_DEPLOYMENT_NAME",
        )?;

        OpenAiChat::new(OpenAiSettings {
            provider: "azure",
            endpoint: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                azure.api_version
            ),
            auth: Auth::ApiKeyHeader(key),
            model: deployment,
            temperature: llm.temperature,
            timeout_seconds: llm.timeout_seconds,
        })
    }

    fn create_huggingface(config: &Config) -> Result<OpenAiChat, LlmError> {
        let llm = &config.llm;
        let token = require(&llm.huggingface_token, "huggingface", "HUGGINGFACE_TOKEN")?;

        OpenAiChat::new(OpenAiSettings {
            provider: "huggingface",
            endpoint: format!(
                "{}/chat/completions",
                llm.huggingface_base_url.trim_end_matches('/')
            ),
            auth: Auth::Bearer(token),
            model: llm
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_HUGGINGFACE_MODEL.to_string()),
            temperature: llm.temperature,
            timeout_seconds: llm.timeout_seconds,
        })
    }
}

fn require(
    value: &Option<String>,
    provider: &'static str,
    variable: &'static str,
) -> Result<String, LlmError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or(LlmError::MissingCredential { provider, variable })
}
