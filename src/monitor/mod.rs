//! CI workflow monitor.
//!
//! Polls `gh run list`, records new runs and runs that have just completed
//! to a JSON-lines history file, and fetches failure details for failed runs.

pub mod gh;
pub mod history;

pub use gh::{GhCli, GhClient};
pub use history::{append_to_history, load_history};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

pub const HISTORY_FILE_NAME: &str = "workflow_history.jsonl";
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_RUN_LIMIT: usize = 10;

/// Slug used when a run URL does not name its repository.
pub const FALLBACK_REPO: &str = "robandrewford/agentic-parallelism";

const RUN_LIST_FIELDS: &str = "databaseId,status,conclusion,headBranch,headSha,workflowName,createdAt,url";
const ERROR_MARKER: &str = "##[error]";

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of `gh run list --json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub database_id: u64,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub head_branch: String,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub url: String,
}

impl WorkflowRun {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failure(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// A line of the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub database_id: u64,
    pub workflow_name: String,
    pub head_branch: String,
    pub head_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub created_at: String,
    pub url: String,
    pub failure_message: String,
    pub captured_at: String,
}

impl WorkflowRecord {
    fn from_run(run: &WorkflowRun, failure_message: String) -> Self {
        Self {
            database_id: run.database_id,
            workflow_name: run.workflow_name.clone(),
            head_branch: run.head_branch.clone(),
            head_sha: run.head_sha.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            created_at: run.created_at.clone(),
            url: run.url.clone(),
            failure_message,
            captured_at: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    pub fn status_icon(&self) -> &'static str {
        match self.conclusion.as_deref() {
            Some("success") => "✅",
            Some("failure") => "❌",
            _ => "⏳",
        }
    }
}

/// `owner/repo` from a run URL such as `https://github.com/owner/repo/actions/runs/1`.
pub fn repo_from_url(url: &str) -> String {
    url.split_once("github.com/")
        .and_then(|(_, rest)| rest.split("/actions").next())
        .filter(|slug| !slug.is_empty())
        .unwrap_or(FALLBACK_REPO)
        .to_string()
}

/// Describe why a run failed.
///
/// Prefers the `##[error]` lines of the failed-step logs and falls back to
/// the failed steps listed in the run's job summary.
pub async fn failure_details(gh: &dyn GhClient, run_id: &str, repo: &str) -> String {
    println!("    Fetching logs for run {} from {}...", run_id, repo);

    if let Some(log) = gh
        .text(&["run", "view", run_id, "--repo", repo, "--log-failed"])
        .await
    {
        let errors: Vec<&str> = log
            .lines()
            .filter_map(|line| line.split(ERROR_MARKER).nth(1))
            .map(str::trim)
            .collect();
        if !errors.is_empty() {
            return errors.join("; ");
        }
    }

    let data = match gh
        .json(&["run", "view", run_id, "--repo", repo, "--json", "jobs"])
        .await
    {
        Some(Value::Null) | None => return "Could not fetch failure details.".to_string(),
        Some(Value::Object(map)) if map.is_empty() => {
            return "Could not fetch failure details.".to_string()
        }
        Some(data) => data,
    };

    let is_failure = |v: &Value| v.get("conclusion").and_then(Value::as_str) == Some("failure");
    let mut messages = Vec::new();

    let jobs = data["jobs"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    for job in jobs.iter().filter(|job| is_failure(*job)) {
        let job_name = job["name"].as_str().unwrap_or("Unknown Job");
        let steps = job["steps"].as_array().map(Vec::as_slice).unwrap_or(&[]);
        for step in steps.iter().filter(|step| is_failure(*step)) {
            let step_name = step["name"].as_str().unwrap_or("Unknown Step");
            messages.push(format!(
                "Job '{}' failed at step '{}'",
                job_name, step_name
            ));
        }
    }

    if messages.is_empty() {
        "Failed (No specific step failure found in summary)".to_string()
    } else {
        messages.join("; ")
    }
}

/// Polling state: the gh client, the history file and the runs seen so far.
pub struct WorkflowMonitor {
    gh: Box<dyn GhClient>,
    history_path: PathBuf,
    limit: usize,
    known: HashMap<String, WorkflowRecord>,
}

impl WorkflowMonitor {
    /// Create a monitor, loading previously seen runs from `history_path`.
    pub fn new(
        gh: Box<dyn GhClient>,
        history_path: impl Into<PathBuf>,
        limit: usize,
    ) -> Result<Self, MonitorError> {
        let history_path = history_path.into();
        let known = load_history(&history_path)?;
        debug!("Loaded {} known runs", known.len());

        Ok(Self {
            gh,
            history_path,
            limit: limit.max(1),
            known,
        })
    }

    pub fn known_runs(&self) -> &HashMap<String, WorkflowRecord> {
        &self.known
    }

    /// Fetch recent runs once and record the ones that are new or just completed.
    pub async fn poll_once(&mut self) -> Result<Vec<WorkflowRecord>, MonitorError> {
        let limit = self.limit.to_string();
        let Some(data) = self
            .gh
            .json(&["run", "list", "--limit", limit.as_str(), "--json", RUN_LIST_FIELDS])
            .await
        else {
            return Ok(Vec::new());
        };

        let runs: Vec<WorkflowRun> = serde_json::from_value(data)?;
        let mut recorded = Vec::new();

        for run in runs {
            let run_id = run.database_id.to_string();
            let is_new = !self.known.contains_key(&run_id);
            let is_update = self
                .known
                .get(&run_id)
                .is_some_and(|prev| prev.status != "completed" && run.is_completed());

            if !is_new && !is_update {
                continue;
            }

            let mut failure_message = String::new();
            if run.is_completed() && run.is_failure() {
                println!(
                    "  -> Run {} ({}) failed. Fetching details...",
                    run_id, run.workflow_name
                );
                let repo = repo_from_url(&run.url);
                failure_message = failure_details(self.gh.as_ref(), &run_id, &repo).await;
            }

            let record = WorkflowRecord::from_run(&run, failure_message);
            append_to_history(&self.history_path, &record)?;
            self.known.insert(run_id.clone(), record.clone());

            println!(
                "{} Run {}: {} ({}) - {} / {}",
                record.status_icon(),
                run_id,
                record.workflow_name,
                record.head_branch,
                record.status,
                record.conclusion.as_deref().unwrap_or("None")
            );
            if !record.failure_message.is_empty() {
                println!("    Error: {}", record.failure_message);
            }

            recorded.push(record);
        }

        Ok(recorded)
    }

    /// Poll every `interval` until Ctrl-C. Errors are logged and polling continues.
    pub async fn run(&mut self, interval: Duration) {
        self.run_until(interval, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll every `interval` until `shutdown` resolves. Shutdown interrupts
    /// an in-flight poll as well as the sleep between polls.
    pub async fn run_until<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        println!(
            "Starting workflow monitor. Polling every {} seconds...",
            interval.as_secs()
        );
        println!("Saving history to: {}", self.history_path.display());

        tokio::pin!(shutdown);

        loop {
            println!("[{}] Checking for updates...", Local::now().format("%H:%M:%S"));

            tokio::select! {
                result = self.poll_once() => match result {
                    Ok(recorded) => debug!("Recorded {} runs", recorded.len()),
                    Err(e) => error!("Unexpected error: {}", e),
                },
                _ = &mut shutdown => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }

        println!("\nStopping monitor.");
        info!("Monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Replies to `gh` invocations from a fixed table keyed by the joined args.
    #[derive(Default, Clone)]
    struct ScriptedGh {
        replies: Arc<Mutex<HashMap<String, String>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedGh {
        fn reply(&self, args: &str, output: &str) {
            self.replies
                .lock()
                .unwrap()
                .insert(args.to_string(), output.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GhClient for ScriptedGh {
        async fn text(&self, args: &[&str]) -> Option<String> {
            let key = args.join(" ");
            self.calls.lock().unwrap().push(key.clone());
            self.replies.lock().unwrap().get(&key).cloned()
        }
    }

    fn list_key() -> String {
        format!("run list --limit 10 --json {}", RUN_LIST_FIELDS)
    }

    fn run_json(id: u64, status: &str, conclusion: &str) -> Value {
        serde_json::json!({
            "databaseId": id,
            "status": status,
            "conclusion": conclusion,
            "headBranch": "main",
            "headSha": "deadbeef",
            "workflowName": "CI",
            "createdAt": "2026-01-01T00:00:00Z",
            "url": format!("https://github.com/acme/widgets/actions/runs/{}", id),
        })
    }

    #[test]
    fn test_repo_from_url() {
        assert_eq!(
            repo_from_url("https://github.com/acme/widgets/actions/runs/42"),
            "acme/widgets"
        );
        assert_eq!(repo_from_url("https://github.com/acme/widgets"), "acme/widgets");
        assert_eq!(repo_from_url("https://example.com/x"), FALLBACK_REPO);
        assert_eq!(repo_from_url(""), FALLBACK_REPO);
    }

    #[test]
    fn test_status_icon() {
        let run: WorkflowRun = serde_json::from_value(run_json(1, "completed", "success")).unwrap();
        assert_eq!(WorkflowRecord::from_run(&run, String::new()).status_icon(), "✅");

        let run: WorkflowRun = serde_json::from_value(run_json(1, "completed", "failure")).unwrap();
        assert_eq!(WorkflowRecord::from_run(&run, String::new()).status_icon(), "❌");

        let run: WorkflowRun = serde_json::from_value(run_json(1, "in_progress", "")).unwrap();
        assert_eq!(WorkflowRecord::from_run(&run, String::new()).status_icon(), "⏳");
    }

    #[tokio::test]
    async fn test_failure_details_from_logs() {
        let gh = ScriptedGh::default();
        gh.reply(
            "run view 9 --repo acme/widgets --log-failed",
            "build\tstep\t##[error]Process completed with exit code 1.\n\
             build\tstep\tnoise\n\
             test\tstep\t##[error] assertion failed \n",
        );

        let details = failure_details(&gh, "9", "acme/widgets").await;
        assert_eq!(
            details,
            "Process completed with exit code 1.; assertion failed"
        );
    }

    #[tokio::test]
    async fn test_failure_details_from_jobs() {
        let gh = ScriptedGh::default();
        gh.reply(
            "run view 9 --repo acme/widgets --json jobs",
            r#"{"jobs": [
                {"name": "lint", "conclusion": "success", "steps": []},
                {"name": "test", "conclusion": "failure", "steps": [
                    {"name": "checkout", "conclusion": "success"},
                    {"name": "cargo test", "conclusion": "failure"}
                ]}
            ]}"#,
        );

        let details = failure_details(&gh, "9", "acme/widgets").await;
        assert_eq!(details, "Job 'test' failed at step 'cargo test'");
    }

    #[tokio::test]
    async fn test_failure_details_fallbacks() {
        let gh = ScriptedGh::default();
        assert_eq!(
            failure_details(&gh, "9", "acme/widgets").await,
            "Could not fetch failure details."
        );

        gh.reply(
            "run view 9 --repo acme/widgets --json jobs",
            r#"{"jobs": [{"name": "test", "conclusion": "failure", "steps": []}]}"#,
        );
        assert_eq!(
            failure_details(&gh, "9", "acme/widgets").await,
            "Failed (No specific step failure found in summary)"
        );
    }

    #[tokio::test]
    async fn test_poll_records_new_and_completed_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);
        let gh = ScriptedGh::default();

        gh.reply(
            &list_key(),
            &serde_json::to_string(&vec![
                run_json(1, "in_progress", ""),
                run_json(2, "completed", "success"),
            ])
            .unwrap(),
        );

        let mut monitor = WorkflowMonitor::new(Box::new(gh.clone()), &path, 10).unwrap();
        let first = monitor.poll_once().await.unwrap();
        assert_eq!(first.len(), 2);

        // Nothing changed: nothing recorded.
        assert!(monitor.poll_once().await.unwrap().is_empty());

        // Run 1 completes with a failure.
        gh.reply(
            &list_key(),
            &serde_json::to_string(&vec![
                run_json(1, "completed", "failure"),
                run_json(2, "completed", "success"),
            ])
            .unwrap(),
        );
        gh.reply(
            "run view 1 --repo acme/widgets --log-failed",
            "x ##[error]boom",
        );

        let update = monitor.poll_once().await.unwrap();
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].database_id, 1);
        assert_eq!(update[0].failure_message, "boom");
        assert!(gh
            .calls()
            .contains(&"run view 1 --repo acme/widgets --log-failed".to_string()));

        let history = load_history(&path).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history["1"].status, "completed");
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);
        let gh = ScriptedGh::default();
        gh.reply(
            &list_key(),
            &serde_json::to_string(&vec![run_json(5, "completed", "success")]).unwrap(),
        );

        let mut monitor = WorkflowMonitor::new(Box::new(gh.clone()), &path, 10).unwrap();
        assert_eq!(monitor.poll_once().await.unwrap().len(), 1);

        let mut restarted = WorkflowMonitor::new(Box::new(gh), &path, 10).unwrap();
        assert_eq!(restarted.known_runs().len(), 1);
        assert!(restarted.poll_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gh_failure_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);

        let mut monitor = WorkflowMonitor::new(Box::new(ScriptedGh::default()), &path, 10).unwrap();
        assert!(monitor.poll_once().await.unwrap().is_empty());
        assert!(!path.exists());
    }

    /// A `gh` that never answers, like a hung network call.
    struct StuckGh;

    #[async_trait]
    impl GhClient for StuckGh {
        async fn text(&self, _args: &[&str]) -> Option<String> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_in_flight_poll() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);
        let mut monitor = WorkflowMonitor::new(Box::new(StuckGh), &path, 10).unwrap();

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.run_until(
                Duration::from_secs(3600),
                tokio::time::sleep(Duration::from_millis(50)),
            ),
        )
        .await;
        assert!(stopped.is_ok());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep_between_polls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE_NAME);
        let gh = ScriptedGh::default();
        let mut monitor = WorkflowMonitor::new(Box::new(gh.clone()), &path, 10).unwrap();

        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.run_until(
                Duration::from_secs(3600),
                tokio::time::sleep(Duration::from_millis(100)),
            ),
        )
        .await;
        assert!(stopped.is_ok());
        assert_eq!(gh.calls(), vec![list_key()]);
    }
}
