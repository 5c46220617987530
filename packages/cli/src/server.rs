// ABOUTME: Host HTTP server embedding the preview next to the main UI
// ABOUTME: Warms up the preview on start and stops it once on graceful shutdown

use anyhow::Context;
use axum::{extract::State, response::Html, routing::get, Router};
use likable_preview::api::create_preview_router;
use likable_preview::render::escape_html;
use likable_preview::PreviewSupervisor;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;

/// Full host application: the index page plus the preview API
pub fn create_router(supervisor: PreviewSupervisor) -> Router {
    create_preview_router()
        .route("/", get(index))
        .with_state(supervisor)
        .layer(TraceLayer::new_for_http())
}

async fn index(State(supervisor): State<PreviewSupervisor>) -> Html<String> {
    let frame = supervisor.render().await;
    Html(render_index(&supervisor.display_url(), &frame))
}

/// Host page around the preview fragment
pub fn render_index(display_url: &str, frame: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Likable</title>
</head>
<body style="font-family: sans-serif; margin: 0 auto; max-width: 1200px; padding: 16px;">
    <h1>Likable</h1>
    <div style="display: flex; gap: 8px; align-items: center; margin-bottom: 12px;">
        <span>Preview: <code>{}</code></span>
        <button onclick="fetch('/api/preview/restart', {{ method: 'POST' }}).then(() => location.reload())">Restart Preview</button>
    </div>
    {}
</body>
</html>
"#,
        escape_html(display_url),
        frame
    )
}

/// Serve until SIGINT/SIGTERM, then stop the preview exactly once.
pub async fn run_server(config: Config, supervisor: PreviewSupervisor) -> anyhow::Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind host server to {}", addr))?;

    info!(
        "Likable listening on http://{}",
        listener.local_addr().unwrap_or(addr)
    );

    let warmup = tokio::spawn(warm_up(supervisor.clone()));

    axum::serve(listener, create_router(supervisor.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // A launch still in flight drops its child, which kills it
    warmup.abort();
    let termination = supervisor.stop().await;
    info!("Preview stopped on shutdown ({})", termination.as_str());
    Ok(())
}

/// Start the preview in the background so the first page load is fast
async fn warm_up(supervisor: PreviewSupervisor) {
    match supervisor.ensure_running().await {
        Ok(outcome) if outcome.ok => info!("{}", outcome.message),
        Ok(outcome) => warn!("Preview not available yet: {}", outcome.message),
        Err(e) => error!("Preview not started: {}", e),
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down...");
}
