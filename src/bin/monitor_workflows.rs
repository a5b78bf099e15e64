//! monitor-workflows - record GitHub Actions runs to a JSON-lines history
//!
//! Polls `gh run list` in a repository checkout and appends new and newly
//! completed runs to `workflow_history.jsonl`, with failure details for
//! failed runs.

use anyhow::{Context, Result};
use clap::Parser;
use parallel_tool_use::monitor::{
    GhCli, WorkflowMonitor, DEFAULT_POLL_INTERVAL_SECONDS, DEFAULT_RUN_LIMIT, HISTORY_FILE_NAME,
};
use parallel_tool_use::observability::init_logging;
use std::path::PathBuf;
use std::time::Duration;

/// Track CI workflow runs via the GitHub CLI
///
/// Examples:
///   monitor-workflows
///   monitor-workflows --repo-dir ../my-repo --interval 30
///   monitor-workflows --once
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct MonitorArgs {
    /// Repository checkout to run `gh` in
    #[arg(long, default_value = ".", value_name = "DIR")]
    repo_dir: PathBuf,

    /// History file (defaults to <repo-dir>/workflow_history.jsonl)
    #[arg(long, value_name = "FILE")]
    history_file: Option<PathBuf>,

    /// Seconds between polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECONDS, value_name = "SECS")]
    interval: u64,

    /// Number of recent runs to fetch per poll
    #[arg(long, default_value_t = DEFAULT_RUN_LIMIT, value_name = "COUNT")]
    limit: usize,

    /// Poll once and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MonitorArgs::parse();

    if args.interval == 0 {
        eprintln!("Error: Interval must be at least 1 second");
        std::process::exit(1);
    }

    init_logging(if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    });

    let history_path = args
        .history_file
        .clone()
        .unwrap_or_else(|| args.repo_dir.join(HISTORY_FILE_NAME));

    let gh = GhCli::new(args.repo_dir.clone());
    let mut monitor = WorkflowMonitor::new(Box::new(gh), &history_path, args.limit)
        .with_context(|| format!("Failed to load history from {}", history_path.display()))?;

    if args.once {
        let recorded = monitor.poll_once().await?;
        println!("Recorded {} runs.", recorded.len());
        return Ok(());
    }

    monitor.run(Duration::from_secs(args.interval)).await;
    Ok(())
}
