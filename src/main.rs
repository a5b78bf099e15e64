//! parallel-tool-use - LLM agent service with parallel tool execution
//!
//! Loads configuration, initializes logging and Sentry, builds the
//! agent ⇄ tools graph for the configured provider and serves it over HTTP.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup or runtime error (configuration, credentials, bind failure)

use anyhow::{Context, Result};
use parallel_tool_use::agent::{AgentGraph, NamedAgent};
use parallel_tool_use::api::{self, AppState, APP_NAME};
use parallel_tool_use::cli::Args;
use parallel_tool_use::config::{load_config, Config, DEFAULT_CONFIG_FILE};
use parallel_tool_use::llm::LlmFactory;
use parallel_tool_use::observability::{init_logging, init_sentry, SentryOptions};
use parallel_tool_use::tools::default_tools;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(args.log_level());

    info!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_server(args).await {
        error!("Server failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default parallel-tool-use.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to choose a provider, model and API port.");
    println!("   API keys are best kept in .env or the environment.");
    Ok(())
}

/// Build the agent from configuration and serve it until shutdown.
async fn run_server(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    debug!("Configuration: {:?}", config);

    // Keep the guard alive for the lifetime of the server
    let _sentry = init_sentry(SentryOptions::from_config(&config))?;

    let model = LlmFactory::create(&config, None).context("Failed to create chat model")?;
    let tools = default_tools(&config).context("Failed to build tools")?;
    let info = model.describe();

    println!("🤖 Initializing agent...");
    println!("   Provider: {}", info.provider);
    println!("   Model: {}", info.model_name);
    println!("   Tools: {}", tools.names().join(", "));
    println!("   Max iterations: {}", config.agent.max_iterations);

    let graph = AgentGraph::new(model, tools, config.agent.max_iterations);
    let agent = Arc::new(NamedAgent::new(APP_NAME, graph));
    let state = AppState::new(agent, config.app.version.clone());

    println!(
        "\n🚀 Serving on http://{}:{} ({})",
        config.api.host, config.api.port, config.app.environment
    );

    api::serve(&config.api, state).await
}
