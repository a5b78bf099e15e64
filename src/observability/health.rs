//! Health reporting for `/health`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::warn;

/// Snapshot returned by the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// `healthy`, or `unhealthy` when any dependency is down.
    pub status: String,
    pub app: String,
    pub version: String,
    pub uptime_seconds: f64,
    /// RFC 3339, UTC.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, bool>>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    app_name: String,
    version: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl HealthCheck {
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn get_health_status(&self, dependencies: Option<&BTreeMap<String, bool>>) -> HealthStatus {
        let dependencies = dependencies.filter(|d| !d.is_empty()).cloned();
        let all_up = dependencies
            .as_ref()
            .map_or(true, |deps| deps.values().all(|up| *up));

        HealthStatus {
            status: if all_up { "healthy" } else { "unhealthy" }.to_string(),
            app: self.app_name.clone(),
            version: self.version.clone(),
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            dependencies,
        }
    }

    /// Run a dependency check; a failing check counts as down.
    pub fn check_dependency<F>(name: &str, check: F) -> bool
    where
        F: FnOnce() -> anyhow::Result<bool>,
    {
        match check() {
            Ok(up) => up,
            Err(e) => {
                warn!("Dependency check failed for {}: {}", name, e);
                false
            }
        }
    }
}
