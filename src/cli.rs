//! Command-line interface argument parsing.
//!
//! Flags given here override both the config file and the environment.

use clap::Parser;
use std::path::PathBuf;

/// parallel-tool-use - LLM agent service with parallel tool execution
///
/// Serves a tool-calling agent over HTTP. The agent can look up stock
/// prices and recent company news, running independent tool calls
/// concurrently.
///
/// Examples:
///   parallel-tool-use
///   parallel-tool-use --port 9000 --provider anthropic
///   parallel-tool-use --config ./parallel-tool-use.toml --verbose
///   parallel-tool-use --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Interface to bind the HTTP server to
    #[arg(long, value_name = "HOST", env = "API_HOST")]
    pub host: Option<String>,

    /// Port to bind the HTTP server to
    #[arg(short, long, value_name = "PORT", env = "API_PORT")]
    pub port: Option<u16>,

    /// LLM provider (openai, anthropic, azure, huggingface)
    #[arg(long, value_name = "NAME", env = "LLM_PROVIDER")]
    pub provider: Option<String>,

    /// Model name, overriding the provider default
    #[arg(short, long, value_name = "MODEL", env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for parallel-tool-use.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default parallel-tool-use.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(ref provider) = self.provider {
            if provider.parse::<crate::llm::Provider>().is_err() {
                return Err(format!("Unsupported LLM provider: {}", provider));
            }
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
