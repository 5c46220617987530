use crate::server::{create_router, render_index};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use likable_preview::{PreviewConfig, PreviewSupervisor};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn empty_sandbox_supervisor(dir: &TempDir) -> PreviewSupervisor {
    PreviewSupervisor::new(PreviewConfig {
        sandbox_dir: dir.path().join("sandbox"),
        cooldown: Duration::ZERO,
        ..PreviewConfig::default()
    })
}

async fn get(uri: &str, supervisor: PreviewSupervisor) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = create_router(supervisor).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_index_shows_error_panel_without_target() {
    let dir = TempDir::new().unwrap();

    let (status, body) = get("/", empty_sandbox_supervisor(&dir)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<title>Likable</title>"));
    assert!(body.contains("No app.py found"));
    assert!(body.contains("Restart Preview"));
}

#[tokio::test]
async fn test_preview_api_is_mounted() {
    let dir = TempDir::new().unwrap();

    let (status, body) = get("/api/preview/status", empty_sandbox_supervisor(&dir)).await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"]["state"], "stopped");
    assert_eq!(json["data"]["port"], 7861);
}

#[test]
fn test_render_index_escapes_url() {
    let html = render_index("/preview/?a=<b>", "<iframe></iframe>");
    assert!(html.contains("/preview/?a=&lt;b&gt;"));
    assert!(html.contains("<iframe></iframe>"));
}
