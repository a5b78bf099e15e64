//! Access to the GitHub CLI.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `gh` subcommands. `None` means the command failed or printed nothing.
#[async_trait]
pub trait GhClient: Send + Sync {
    /// Plain stdout of `gh <args>`.
    async fn text(&self, args: &[&str]) -> Option<String>;

    /// Stdout of `gh <args>` decoded as JSON.
    async fn json(&self, args: &[&str]) -> Option<Value> {
        let output = self.text(args).await?;
        match serde_json::from_str(&output) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Error decoding JSON from gh {}: {}", args.join(" "), e);
                None
            }
        }
    }
}

/// The `gh` executable, run inside a repository checkout.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
    repo_dir: PathBuf,
}

impl GhCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "gh".to_string(),
            repo_dir: repo_dir.into(),
        }
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl GhClient for GhCli {
    async fn text(&self, args: &[&str]) -> Option<String> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = match Command::new(&self.program)
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Error running gh command: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            warn!(
                "Error running gh command: {} exited with {}",
                args.join(" "),
                output.status
            );
            warn!("Stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            None
        } else {
            Some(stdout)
        }
    }
}
