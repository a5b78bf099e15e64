//! Configuration handling.
//!
//! Settings are layered, later sources winning:
//! 1. built-in defaults
//! 2. `parallel-tool-use.toml` (or the file given with `--config`)
//! 3. environment variables, including those loaded from `.env`
//! 4. command-line flags

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "parallel-tool-use.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub sentry: SentryConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub agent: AgentSettings,
}

/// Deployment identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment: local, staging, production.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Application version reported by `/` and `/health`.
    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            version: default_version(),
        }
    }
}

fn default_environment() -> String {
    "local".to_string()
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// LLM provider settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// openai, anthropic, azure or huggingface.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    #[serde(default)]
    pub huggingface_token: Option<String>,

    #[serde(default = "default_huggingface_base_url")]
    pub huggingface_base_url: String,

    #[serde(default)]
    pub azure: AzureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            anthropic_api_key: None,
            anthropic_base_url: default_anthropic_base_url(),
            huggingface_token: None,
            huggingface_base_url: default_huggingface_base_url(),
            azure: AzureConfig::default(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("openai_api_key", &redacted(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_api_key", &redacted(&self.anthropic_api_key))
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("huggingface_token", &redacted(&self.huggingface_token))
            .field("huggingface_base_url", &self.huggingface_base_url)
            .field("azure", &self.azure)
            .finish()
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> u64 {
    120
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_huggingface_base_url() -> String {
    "https://router.huggingface.co/v1".to_string()
}

/// Azure OpenAI deployment settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_azure_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub deployment_name: Option<String>,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: default_azure_api_version(),
            deployment_name: None,
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &redacted(&self.api_key))
            .field("api_version", &self.api_version)
            .field("deployment_name", &self.deployment_name)
            .finish()
    }
}

fn default_azure_api_version() -> String {
    "2024-02-15-preview".to_string()
}

/// Sentry error tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Sentry is disabled without a DSN.
    #[serde(default)]
    pub dsn: Option<String>,

    /// Defaults to `app.environment`.
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default = "default_traces_sample_rate")]
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            traces_sample_rate: default_traces_sample_rate(),
        }
    }
}

fn default_traces_sample_rate() -> f32 {
    0.1
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// External services used by the tools.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_tavily_base_url")]
    pub tavily_base_url: String,

    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            tavily_base_url: default_tavily_base_url(),
            yahoo_base_url: default_yahoo_base_url(),
        }
    }
}

impl fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("tavily_api_key", &redacted(&self.tavily_api_key))
            .field("tavily_base_url", &self.tavily_base_url)
            .field("yahoo_base_url", &self.yahoo_base_url)
            .finish()
    }
}

fn default_tavily_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_yahoo_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Node visits allowed per query.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> usize {
    crate::agent::graph::DEFAULT_MAX_ITERATIONS
}

fn redacted(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<redacted>",
        None => "<unset>",
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw.to_string()))
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` resolves a variable name; each name is tried upper-case
    /// first, then lower-case. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .or_else(|| lookup(&name.to_lowercase()))
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = get("ENVIRONMENT") {
            self.app.environment = v;
        }
        if let Some(v) = get("VERSION") {
            self.app.version = v;
        }

        if let Some(v) = get("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("LLM_TEMPERATURE") {
            self.llm.temperature = parse_value("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECONDS") {
            self.llm.timeout_seconds = parse_value("LLM_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.openai_base_url = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.llm.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_BASE_URL") {
            self.llm.anthropic_base_url = v;
        }
        if let Some(v) = get("HUGGINGFACE_TOKEN") {
            self.llm.huggingface_token = Some(v);
        }
        if let Some(v) = get("HUGGINGFACE_BASE_URL") {
            self.llm.huggingface_base_url = v;
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.azure.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_KEY") {
            self.llm.azure.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.azure.api_version = v;
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.llm.azure.deployment_name = Some(v);
        }

        if let Some(v) = get("SENTRY_DSN") {
            self.sentry.dsn = Some(v);
        }
        if let Some(v) = get("SENTRY_ENVIRONMENT") {
            self.sentry.environment = Some(v);
        }
        if let Some(v) = get("SENTRY_TRACES_SAMPLE_RATE") {
            self.sentry.traces_sample_rate = parse_value("SENTRY_TRACES_SAMPLE_RATE", &v)?;
        }

        if let Some(v) = get("API_HOST") {
            self.api.host = v;
        }
        if let Some(v) = get("API_PORT") {
            self.api.port = parse_value("API_PORT", &v)?;
        }

        if let Some(v) = get("TAVILY_API_KEY") {
            self.tools.tavily_api_key = Some(v);
        }

        if let Some(v) = get("AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = parse_value("AGENT_MAX_ITERATIONS", &v)?;
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence; only explicitly given flags override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.api.host = host.clone();
        }
        if let Some(port) = args.port {
            self.api.port = port;
        }
        if let Some(ref provider) = args.provider {
            self.llm.provider = provider.clone();
        }
        if let Some(ref model) = args.model {
            self.llm.model = Some(model.clone());
        }
    }

    /// Check value ranges and that the provider is supported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, value: String| Err(ConfigError::InvalidValue(name.to_string(), value));

        if self
            .llm
            .provider
            .parse::<crate::llm::Provider>()
            .is_err()
        {
            return invalid("LLM_PROVIDER", self.llm.provider.clone());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("LLM_TEMPERATURE", self.llm.temperature.to_string());
        }
        if self.llm.provider.trim().eq_ignore_ascii_case("anthropic")
            && self.llm.temperature > crate::llm::anthropic::MAX_TEMPERATURE
        {
            return invalid("LLM_TEMPERATURE", self.llm.temperature.to_string());
        }
        if self.llm.timeout_seconds == 0 {
            return invalid("LLM_TIMEOUT_SECONDS", "0".to_string());
        }
        if !(0.0..=1.0).contains(&self.sentry.traces_sample_rate) {
            return invalid(
                "SENTRY_TRACES_SAMPLE_RATE",
                self.sentry.traces_sample_rate.to_string(),
            );
        }
        if self.api.port == 0 {
            return invalid("API_PORT", "0".to_string());
        }
        if self.agent.max_iterations == 0 {
            return invalid("AGENT_MAX_ITERATIONS", "0".to_string());
        }
        Ok(())
    }

    /// Sentry environment, falling back to the deployment environment.
    pub fn sentry_environment(&self) -> &str {
        self.sentry
            .environment
            .as_deref()
            .unwrap_or(&self.app.environment)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

/// Load configuration from `.env`, file, environment and CLI flags.
pub fn load_config(args: &crate::cli::Args) -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env loaded: {}", e),
    }

    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        Config::load(config_path)?
    } else {
        match Config::load_default()? {
            Some(config) => {
                info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
                config
            }
            None => {
                debug!("No config file found, using defaults");
                Config::default()
            }
        }
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    config.merge_with_args(args);
    config.validate()?;

    Ok(config)
}
