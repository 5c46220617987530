pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use handlers::AppState;

/// Create the preview API router.
///
/// The caller supplies the state with `.with_state(supervisor)` and may merge
/// the router into a larger application.
pub fn create_preview_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/preview/status", get(handlers::get_preview_status))
        .route("/api/preview/ensure", post(handlers::ensure_preview))
        .route("/api/preview/restart", post(handlers::restart_preview))
        .route("/api/preview/stop", post(handlers::stop_preview))
        .route("/api/preview/logs", get(handlers::get_preview_logs))
        .route("/api/preview/frame", get(handlers::get_preview_frame))
}
