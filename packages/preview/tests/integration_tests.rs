// ABOUTME: End-to-end tests for the preview supervisor against real child processes
// ABOUTME: Covers launch, idempotence, restart, cooldown, stop, crash detection and recovery after an external kill

#![cfg(unix)]

use likable_preview::{
    is_port_available, OutcomeKind, PreviewConfig, PreviewError, PreviewState, PreviewSupervisor,
    Termination,
};
use serial_test::serial;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

/// A stand-in for a generated Gradio app: honours the launch flags and serves HTTP
const PYTHON_APP: &str = r#"import argparse
import http.server

parser = argparse.ArgumentParser()
parser.add_argument("--server-port", type=int, default=7860)
parser.add_argument("--server-name", default="127.0.0.1")
args = parser.parse_args()

server = http.server.HTTPServer((args.server_name, args.server_port), http.server.SimpleHTTPRequestHandler)
print(f"* Running on local URL:  http://{args.server_name}:{args.server_port}", flush=True)
server.serve_forever()
"#;

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn write_app(dir: &Path, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("app.py"), body).unwrap();
}

fn test_config(sandbox: &Path, interpreter: &str, cooldown: Duration) -> PreviewConfig {
    PreviewConfig {
        port: free_port(),
        host: "127.0.0.1".to_string(),
        sandbox_dir: sandbox.to_path_buf(),
        interpreter: interpreter.to_string(),
        cooldown,
        probe_attempts: 3,
        probe_timeout: Duration::from_millis(500),
        probe_interval: Duration::from_millis(200),
        port_wait_attempts: 10,
        port_wait_interval: Duration::from_millis(200),
        startup_timeout: Duration::from_secs(10),
        startup_poll_interval: Duration::from_millis(100),
        terminate_grace: Duration::from_secs(5),
        kill_wait: Duration::from_secs(2),
        ..PreviewConfig::default()
    }
}

/// Supervisor over a sandbox holding the Python app, or `None` when python3 is missing
fn python_supervisor(cooldown: Duration) -> Option<(PreviewSupervisor, TempDir)> {
    if !python_available() {
        eprintln!("python3 not available, skipping");
        return None;
    }
    let dir = TempDir::new().unwrap();
    write_app(&dir.path().join("todo"), PYTHON_APP);
    let supervisor = PreviewSupervisor::new(test_config(dir.path(), "python3", cooldown));
    Some((supervisor, dir))
}

#[tokio::test]
#[serial]
async fn test_launch_and_render_iframe() {
    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };

    let outcome = supervisor.ensure_running().await.unwrap();
    assert!(outcome.ok, "launch failed: {}", outcome.message);
    assert_eq!(outcome.kind, OutcomeKind::Started);

    let status = supervisor.status().await;
    assert_eq!(status.state, PreviewState::Healthy);
    assert!(status.pid.is_some());
    assert_eq!(status.detected_port, None);
    assert!(status.script.unwrap().ends_with("todo/app.py"));

    let html = supervisor.render().await;
    assert!(html.starts_with("<iframe"));
    assert!(html.contains(&format!(":{}", supervisor.config().port)));

    // The announcement may still be in flight through the reader task
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let announced = loop {
        let logs = supervisor.logs(None, None).await;
        if logs.iter().any(|log| log.message.contains("Running on local URL")) {
            break true;
        }
        if tokio::time::Instant::now() >= deadline {
            break false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert!(announced);

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_ensure_running_is_idempotent() {
    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };

    let first = supervisor.ensure_running().await.unwrap();
    assert_eq!(first.kind, OutcomeKind::Started);
    let pid = supervisor.status().await.pid;

    let second = supervisor.ensure_running().await.unwrap();
    assert_eq!(second.kind, OutcomeKind::AlreadyRunning);
    assert!(second.ok);
    assert_eq!(supervisor.launch_count(), 1);
    assert_eq!(supervisor.status().await.pid, pid);

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_concurrent_ensure_launches_once() {
    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };

    let (a, b) = tokio::join!(supervisor.ensure_running(), supervisor.ensure_running());
    assert!(a.unwrap().ok);
    assert!(b.unwrap().ok);
    assert_eq!(supervisor.launch_count(), 1);

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_restart_twice_within_cooldown() {
    let Some((supervisor, _dir)) = python_supervisor(Duration::from_secs(10)) else {
        return;
    };

    let first = supervisor.restart().await.unwrap();
    assert_eq!(first.kind, OutcomeKind::Started);

    let second = supervisor.restart().await.unwrap();
    assert!(second.is_cooldown());
    assert!(!second.ok);
    // The healthy child is still displayed while the restart is refused
    assert!(second.display_url.is_some());
    assert_eq!(supervisor.launch_count(), 1);

    let status = supervisor.status().await;
    assert!(status.pid.is_some());
    assert!(status.cooldown_remaining_secs.unwrap() > 0.0);

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_stop_clears_process_and_frees_port() {
    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };
    let port = supervisor.config().port;

    assert!(supervisor.ensure_running().await.unwrap().ok);
    assert!(!is_port_available("127.0.0.1", port));

    assert_eq!(supervisor.stop().await, Termination::Graceful);

    let status = supervisor.status().await;
    assert_eq!(status.state, PreviewState::Stopped);
    assert_eq!(status.pid, None);
    assert!(likable_preview::wait_for_port_release(
        "127.0.0.1",
        port,
        10,
        Duration::from_millis(200)
    )
    .await);

    assert_eq!(supervisor.stop().await, Termination::NotRunning);
}

#[tokio::test]
#[serial]
async fn test_relaunch_after_external_kill() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };

    assert!(supervisor.ensure_running().await.unwrap().ok);
    let pid = supervisor.status().await.pid.unwrap();
    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let outcome = supervisor.ensure_running().await.unwrap();
    assert_eq!(outcome.kind, OutcomeKind::Started, "{}", outcome.message);
    assert_eq!(supervisor.launch_count(), 2);
    assert_ne!(supervisor.status().await.pid, Some(pid));

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_restart_replaces_healthy_child() {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Some((supervisor, _dir)) = python_supervisor(Duration::ZERO) else {
        return;
    };

    assert!(supervisor.ensure_running().await.unwrap().ok);
    let old_pid = supervisor.status().await.pid.unwrap();

    let outcome = supervisor.restart().await.unwrap();
    assert_eq!(outcome.kind, OutcomeKind::Started, "{}", outcome.message);
    assert_eq!(supervisor.launch_count(), 2);

    let new_pid = supervisor.status().await.pid.unwrap();
    assert_ne!(new_pid, old_pid);
    // The previous child was stopped and reaped before the new one started
    assert_eq!(kill(Pid::from_raw(old_pid as i32), None), Err(Errno::ESRCH));

    supervisor.stop().await;
}

#[tokio::test]
#[serial]
async fn test_crash_on_startup_is_reported_quickly() {
    let dir = TempDir::new().unwrap();
    write_app(
        dir.path(),
        "echo 'Traceback (most recent call last):' >&2\necho \"ModuleNotFoundError: No module named 'gradio'\" >&2\nexit 1\n",
    );
    let supervisor = PreviewSupervisor::new(test_config(dir.path(), "sh", Duration::ZERO));

    let started = tokio::time::Instant::now();
    let outcome = supervisor.ensure_running().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.kind, OutcomeKind::ExitedDuringStartup);
    assert!(outcome.message.contains("No module named 'gradio'"));

    let html = supervisor.render().await;
    assert!(html.contains("Refresh Preview"));
}

#[tokio::test]
#[serial]
async fn test_ambiguous_sandbox_never_launches() {
    let dir = TempDir::new().unwrap();
    write_app(&dir.path().join("first"), "exec sleep 30\n");
    write_app(&dir.path().join("second"), "exec sleep 30\n");
    let supervisor = PreviewSupervisor::new(test_config(dir.path(), "sh", Duration::ZERO));

    match supervisor.ensure_running().await {
        Err(PreviewError::AmbiguousTarget { candidates, .. }) => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected AmbiguousTarget, got {:?}", other),
    }
    assert!(supervisor.restart().await.is_err());
    assert_eq!(supervisor.launch_count(), 0);
    assert_eq!(supervisor.status().await.pid, None);
}

#[tokio::test]
#[serial]
async fn test_missing_sandbox_is_not_found() {
    let dir = TempDir::new().unwrap();
    let supervisor = PreviewSupervisor::new(test_config(
        &dir.path().join("sandbox"),
        "sh",
        Duration::ZERO,
    ));

    let outcome = supervisor.ensure_running().await.unwrap();
    assert_eq!(outcome.kind, OutcomeKind::TargetNotFound);

    let html = supervisor.render().await;
    assert!(html.contains("No app.py found"));
}
