// ABOUTME: Child process controller for the preview app
// ABOUTME: Launches the target script with port/host flags, captures output, terminates with escalation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::output::{extract_port_from_log, is_successful_http_log, OutputBuffer};
use crate::types::{LogType, PreviewError, PreviewLog, PreviewResult};

/// Lines of each stream included in failure messages
const SUMMARY_LINES: usize = 40;

/// Everything needed to build the launch command for a target script
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub interpreter: String,
    pub script: PathBuf,
    pub host: String,
    pub port: u16,
}

impl LaunchSpec {
    /// Arguments passed to the interpreter; the script runs from its own directory
    pub fn args(&self) -> Vec<String> {
        let script_name = self
            .script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.script.to_string_lossy().into_owned());

        vec![
            script_name,
            "--server-port".to_string(),
            self.port.to_string(),
            "--server-name".to_string(),
            self.host.clone(),
        ]
    }

    pub fn working_dir(&self) -> &Path {
        match self.script.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn command_line(&self) -> String {
        format!("{} {}", self.interpreter, self.args().join(" "))
    }
}

/// Result of a non-blocking liveness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Exited { code: Option<i32>, output: String },
}

/// How a termination request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Nothing was running
    NotRunning,
    AlreadyExited,
    Graceful,
    Killed,
    /// The child did not confirm its exit even after SIGKILL
    Uncertain,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::NotRunning => "not_running",
            Termination::AlreadyExited => "already_exited",
            Termination::Graceful => "graceful",
            Termination::Killed => "killed",
            Termination::Uncertain => "uncertain",
        }
    }
}

/// The single preview child owned by the supervisor
#[derive(Debug)]
pub struct SupervisedProcess {
    child: Child,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    started: Instant,
    port: u16,
    script: PathBuf,
    output: OutputBuffer,
    readers: Vec<JoinHandle<()>>,
    detected_port: Arc<AtomicU16>,
}

impl SupervisedProcess {
    /// Launch the target script.
    ///
    /// Output is piped into an [`OutputBuffer`] by background reader tasks so
    /// the child never blocks on a full pipe, and never interleaves with the
    /// host's own logs.
    ///
    /// # Errors
    ///
    /// * `PreviewError::LaunchError` - the script is missing or the interpreter could not be spawned
    pub async fn start(spec: &LaunchSpec) -> PreviewResult<Self> {
        let command_line = spec.command_line();

        if !spec.script.is_file() {
            return Err(PreviewError::LaunchError {
                command: command_line,
                reason: format!("script not found: {}", spec.script.display()),
            });
        }

        let working_dir = spec.working_dir();
        let mut command = Command::new(&spec.interpreter);
        command
            .args(spec.args())
            .current_dir(working_dir)
            // Python buffers stdout when it is a pipe
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            error!("Failed to spawn preview app '{}': {}", command_line, e);
            PreviewError::LaunchError {
                command: command_line.clone(),
                reason: e.to_string(),
            }
        })?;

        let pid = child.id();
        let output = OutputBuffer::new();
        output
            .push(
                LogType::System,
                format!(
                    "Started `{}` in {} (PID: {:?})",
                    command_line,
                    working_dir.display(),
                    pid
                ),
            )
            .await;

        let detected_port = Arc::new(AtomicU16::new(0));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(
                stdout,
                LogType::Stdout,
                output.clone(),
                spec.port,
                detected_port.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(
                stderr,
                LogType::Stderr,
                output.clone(),
                spec.port,
                detected_port.clone(),
            ));
        }

        info!(
            "Spawned preview app `{}` with PID {:?} on port {}",
            command_line, pid, spec.port
        );

        Ok(Self {
            child,
            pid,
            started_at: Utc::now(),
            started: Instant::now(),
            port: spec.port,
            script: spec.script.clone(),
            output,
            readers,
            detected_port,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Port the child announced in its output when it differs from the assigned one
    pub fn detected_port(&self) -> Option<u16> {
        match self.detected_port.load(Ordering::Relaxed) {
            0 => None,
            port => Some(port),
        }
    }

    pub async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<PreviewLog> {
        self.output.entries(since, limit).await
    }

    /// Shared handle to the captured output; stays readable after the child is gone
    pub fn output_buffer(&self) -> OutputBuffer {
        self.output.clone()
    }

    pub async fn output_summary(&self) -> String {
        self.output.summary(SUMMARY_LINES).await
    }

    /// Non-blocking check of whether the child is still alive
    pub async fn poll(&mut self) -> ProcessState {
        match self.child.try_wait() {
            Ok(None) => ProcessState::Running,
            Ok(Some(status)) => {
                debug!("Preview process {:?} exited with {}", self.pid, status);
                ProcessState::Exited {
                    code: status.code(),
                    output: self.output_summary().await,
                }
            }
            Err(e) => {
                // waitpid failing means the child is no longer ours to observe
                warn!("Failed to query preview process {:?}: {}", self.pid, e);
                ProcessState::Exited {
                    code: None,
                    output: format!("Could not query process status: {}", e),
                }
            }
        }
    }

    /// Wait (bounded) for the reader tasks to hit EOF so the summary is complete
    pub async fn drain_output(&mut self, wait: Duration) {
        let deadline = Instant::now() + wait;
        for reader in self.readers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if timeout(remaining, reader).await.is_err() {
                debug!("Output reader for {:?} still busy after {:?}", self.pid, wait);
            }
        }
    }

    /// Stop the child: SIGTERM, wait `grace`, SIGKILL, wait `kill_wait`.
    ///
    /// Never fails; problems are logged and reflected in the returned
    /// [`Termination`].
    pub async fn terminate(&mut self, grace: Duration, kill_wait: Duration) -> Termination {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                info!(
                    "Preview process {:?} had already exited ({})",
                    self.pid, status
                );
                return Termination::AlreadyExited;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to query preview process {:?}: {}", self.pid, e),
        }

        info!("Stopping preview app process (PID: {:?})...", self.pid);
        self.output
            .push(LogType::System, "Stopping preview process".to_string())
            .await;

        if self.send_terminate() {
            match timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Preview app stopped gracefully ({})", status);
                    return Termination::Graceful;
                }
                Ok(Err(e)) => warn!("Error waiting for preview process {:?}: {}", self.pid, e),
                Err(_) => warn!(
                    "Preview process {:?} did not exit within {:?} of SIGTERM, sending SIGKILL",
                    self.pid, grace
                ),
            }
        }

        if let Err(e) = self.child.start_kill() {
            warn!("Failed to send SIGKILL to preview process {:?}: {}", self.pid, e);
        }

        match timeout(kill_wait, self.child.wait()).await {
            Ok(Ok(status)) => {
                warn!("Preview app force-killed after timeout ({})", status);
                Termination::Killed
            }
            Ok(Err(e)) => {
                error!(
                    "Error waiting for preview process {:?} after SIGKILL: {}",
                    self.pid, e
                );
                Termination::Uncertain
            }
            Err(_) => {
                error!(
                    "{}",
                    PreviewError::TerminationUncertain {
                        pid: self.pid.unwrap_or_default()
                    }
                );
                Termination::Uncertain
            }
        }
    }

    /// Send the graceful termination signal; false if it could not be delivered
    #[cfg(unix)]
    fn send_terminate(&mut self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return false;
        };

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(_) => {
                debug!("Sent SIGTERM to process with PID: {}", pid);
                true
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to PID {}: {}", pid, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> bool {
        // No graceful signal on this platform; escalate straight to kill
        false
    }
}

fn spawn_reader<R>(
    stream: R,
    log_type: LogType,
    output: OutputBuffer,
    expected_port: u16,
    detected_port: Arc<AtomicU16>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Stopped reading preview {:?}: {}", log_type, e);
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf).trim_end().to_string();
            if line.is_empty() {
                continue;
            }

            if let Some(port) = extract_port_from_log(&line) {
                if port != expected_port {
                    warn!(
                        "Preview app announced port {} but was assigned {}; it may be ignoring --server-port",
                        port, expected_port
                    );
                    detected_port.store(port, Ordering::Relaxed);
                }
            }

            // Access logs on stderr are informational, not errors
            let kind = if log_type == LogType::Stderr && is_successful_http_log(&line) {
                LogType::System
            } else {
                log_type
            };
            output.push(kind, line).await;
        }
    })
}
