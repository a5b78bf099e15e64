//! HTTP API exposing the agent.
//!
//! Routes:
//! - `GET /` service description
//! - `GET /health` health status
//! - `POST /run` run the agent on a query

mod error;
mod handlers;

pub use error::ApiError;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::config::ApiConfig;
use crate::observability::HealthCheck;

/// Name reported by the health endpoint.
pub const APP_NAME: &str = "parallel-tool-use";
pub const APP_TITLE: &str = "App 01: Parallel Tool Use";
pub const APP_DESCRIPTION: &str = "Production-ready agent with parallel tool execution";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn Agent>,
    pub health: Arc<HealthCheck>,
    pub version: String,
}

impl AppState {
    pub fn new(agent: Arc<dyn Agent>, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            agent,
            health: Arc::new(HealthCheck::new(APP_NAME, version.clone())),
            version,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/run", post(handlers::run_agent))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(config: &ApiConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
