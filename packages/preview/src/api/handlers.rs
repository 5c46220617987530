use crate::{
    supervisor::PreviewSupervisor,
    types::{
        ApiResponse, PreviewError, PreviewLogsResponse, PreviewOutcome, PreviewStatus,
        StopResponse,
    },
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Json},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

/// Shared application state; clones drive the same preview process
pub type AppState = PreviewSupervisor;

/// Ensure the preview is running, launching it if needed
pub async fn ensure_preview(
    State(supervisor): State<AppState>,
) -> (StatusCode, Json<ApiResponse<PreviewOutcome>>) {
    outcome_response(supervisor.ensure_running().await)
}

/// Force a restart, subject to the cooldown window
pub async fn restart_preview(
    State(supervisor): State<AppState>,
) -> (StatusCode, Json<ApiResponse<PreviewOutcome>>) {
    info!("Restart requested through the API");
    outcome_response(supervisor.restart().await)
}

/// Stop the preview process
pub async fn stop_preview(State(supervisor): State<AppState>) -> Json<ApiResponse<StopResponse>> {
    let termination = supervisor.stop().await;
    info!("Preview stopped through the API ({})", termination.as_str());
    Json(ApiResponse::success(StopResponse {
        termination: termination.as_str().to_string(),
    }))
}

/// Current supervisor state, without probing the child
pub async fn get_preview_status(
    State(supervisor): State<AppState>,
) -> Json<ApiResponse<PreviewStatus>> {
    Json(ApiResponse::success(supervisor.status().await))
}

/// Query parameters for getting preview logs
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

/// Get captured preview output
pub async fn get_preview_logs(
    Query(query): Query<LogsQuery>,
    State(supervisor): State<AppState>,
) -> Json<ApiResponse<PreviewLogsResponse>> {
    let logs = supervisor.logs(query.since, query.limit).await;
    Json(ApiResponse::success(PreviewLogsResponse { logs }))
}

/// Embeddable preview fragment: an iframe, or an error panel
pub async fn get_preview_frame(State(supervisor): State<AppState>) -> Html<String> {
    Html(supervisor.render().await)
}

/// Health check endpoint for the preview service
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Preview service is healthy".to_string()))
}

fn outcome_response(
    result: Result<PreviewOutcome, PreviewError>,
) -> (StatusCode, Json<ApiResponse<PreviewOutcome>>) {
    match result {
        // Failed launches are still well-formed answers; `ok` tells them apart
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::success(outcome))),
        Err(e @ PreviewError::AmbiguousTarget { .. }) => {
            error!("Refusing to launch preview: {}", e);
            (StatusCode::CONFLICT, Json(ApiResponse::error(e)))
        }
        Err(e) => {
            error!("Preview operation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::error(e)))
        }
    }
}
