use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::agent::GraphError;
use crate::observability::capture_error;

/// Errors surfaced by handlers. All map to `500 {"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] GraphError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // warn! only becomes a breadcrumb under the sentry-tracing layer;
        // the exception event below is the single report for this failure.
        warn!("Error executing agent: {}", self);
        capture_error(&self);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}
