use axum::extract::State;
use axum::Json;
use std::time::Instant;
use tracing::{debug, info};

use super::error::ApiError;
use super::{AppState, APP_DESCRIPTION, APP_TITLE};
use crate::models::{Endpoints, QueryRequest, QueryResponse, RootInfo};
use crate::observability::HealthStatus;

/// `GET /`
pub async fn root(State(state): State<AppState>) -> Json<RootInfo> {
    Json(RootInfo {
        name: APP_TITLE.to_string(),
        version: state.version.clone(),
        description: APP_DESCRIPTION.to_string(),
        endpoints: Endpoints::default(),
        tools: state.agent.tool_names(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.health.get_health_status(None))
}

/// `POST /run`
pub async fn run_agent(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let start = Instant::now();
    if request.stream {
        debug!("Streaming requested; returning the final state");
    }

    let final_state = state.agent.execute(&request.query).await?;
    let total_time = start.elapsed().as_secs_f64();

    info!(
        "Agent {} answered in {:.2}s ({} messages)",
        state.agent.name(),
        total_time,
        final_state.messages.len()
    );

    Ok(Json(QueryResponse::from_state(&final_state, total_time)))
}
