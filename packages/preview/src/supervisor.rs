// ABOUTME: Preview supervisor owning the single preview child process
// ABOUTME: Serializes ensure/restart/stop behind one lock and rate-limits restarts with a cooldown

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::PreviewConfig;
use crate::cooldown::CooldownWindow;
use crate::health::{self, HealthVerdict};
use crate::output::OutputBuffer;
use crate::probe::wait_for_port_release;
use crate::process::{LaunchSpec, ProcessState, SupervisedProcess, Termination};
use crate::render::{render_error_panel, render_iframe};
use crate::target::find_target;
use crate::types::{
    OutcomeKind, PreviewError, PreviewLog, PreviewOutcome, PreviewResult, PreviewState,
    PreviewStatus,
};

/// Owner of the preview child, shared by every UI-facing handler.
///
/// Cloning is cheap and every clone drives the same child. All operations
/// that can start or stop the child take the same lock, so overlapping
/// requests can neither launch two children on the preview port nor lose a
/// stop by overwriting a live handle.
#[derive(Clone)]
pub struct PreviewSupervisor {
    config: Arc<PreviewConfig>,
    inner: Arc<Mutex<SupervisorInner>>,
    launches: Arc<AtomicU64>,
}

struct SupervisorInner {
    process: Option<SupervisedProcess>,
    state: PreviewState,
    cooldown: CooldownWindow,
    last_message: Option<String>,
    /// Output of the most recent child, kept after it exits for diagnostics
    last_output: Option<OutputBuffer>,
}

impl PreviewSupervisor {
    pub fn new(config: PreviewConfig) -> Self {
        let cooldown = CooldownWindow::new(config.cooldown);
        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(SupervisorInner {
                process: None,
                state: PreviewState::Stopped,
                cooldown,
                last_message: None,
                last_output: None,
            })),
            launches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(PreviewConfig::from_env())
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn display_url(&self) -> String {
        self.config.display_url()
    }

    /// Number of child processes spawned over the supervisor's lifetime
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Make sure a healthy preview is running, launching one if needed.
    ///
    /// A healthy child is left untouched. Otherwise the unhealthy child (if
    /// any) is replaced, subject to the cooldown window.
    ///
    /// # Errors
    ///
    /// Only `PreviewError::AmbiguousTarget`: the sandbox holds several target
    /// scripts and must be fixed by hand. Every other failure is reported
    /// through the returned [`PreviewOutcome`].
    pub async fn ensure_running(&self) -> PreviewResult<PreviewOutcome> {
        let supervisor = self.clone();
        run_to_completion(async move { supervisor.ensure_running_locked().await }).await
    }

    async fn ensure_running_locked(&self) -> PreviewResult<PreviewOutcome> {
        let mut inner = self.inner.lock().await;

        if inner.process.is_some() {
            let verdict = self.check_health(&mut inner).await;
            if verdict.is_healthy() {
                let pid = inner.process.as_ref().and_then(|p| p.pid());
                info!("Preview app already running and healthy (PID: {:?})", pid);
                inner.state = PreviewState::Healthy;
                let message = format!("Preview running at {}", self.display_url());
                inner.last_message = Some(message.clone());
                return Ok(PreviewOutcome::success(
                    OutcomeKind::AlreadyRunning,
                    message,
                    self.display_url(),
                ));
            }

            warn!(
                "Preview app unhealthy: {}, attempting restart...",
                verdict.message
            );
            inner.state = PreviewState::Unhealthy;
            inner.last_message = Some(verdict.message);
        } else {
            info!("No preview process exists, starting new one");
        }

        self.launch_locked(&mut inner).await
    }

    /// Stop the current child (if any) and launch a fresh one, subject to the cooldown window.
    ///
    /// # Errors
    ///
    /// Only `PreviewError::AmbiguousTarget`, as for [`ensure_running`](Self::ensure_running).
    pub async fn restart(&self) -> PreviewResult<PreviewOutcome> {
        let supervisor = self.clone();
        run_to_completion(async move {
            let mut inner = supervisor.inner.lock().await;
            info!("Restart requested for preview app");
            supervisor.launch_locked(&mut inner).await
        })
        .await
    }

    /// Stop the child, gracefully first and forcefully after the grace period.
    ///
    /// Idempotent and infallible: the handle is cleared even when the exit
    /// could not be confirmed. An explicit stop also clears the cooldown
    /// window, so the next `ensure_running` launches immediately.
    pub async fn stop(&self) -> Termination {
        let supervisor = self.clone();
        match tokio::spawn(async move { supervisor.stop_locked().await }).await {
            Ok(termination) => termination,
            Err(e) => {
                error!("Preview stop task failed: {}", e);
                Termination::Uncertain
            }
        }
    }

    async fn stop_locked(&self) -> Termination {
        let mut inner = self.inner.lock().await;

        let termination = match inner.process.take() {
            Some(mut process) => {
                process
                    .terminate(self.config.terminate_grace, self.config.kill_wait)
                    .await
            }
            None => Termination::NotRunning,
        };

        if termination == Termination::Uncertain {
            warn!("Treating preview process as stopped; a port conflict on the next start will surface it");
        }

        inner.state = PreviewState::Stopped;
        inner.cooldown.reset();
        inner.last_message = Some(format!("Preview stopped ({})", termination.as_str()));
        termination
    }

    /// Embeddable markup for the current preview; never fails.
    pub async fn render(&self) -> String {
        match self.ensure_running().await {
            Ok(outcome) => match (&outcome.display_url, outcome.ok) {
                (Some(url), true) => render_iframe(url, &self.config.iframe_height),
                _ => render_error_panel(&outcome.message),
            },
            Err(e) => render_error_panel(&e.to_string()),
        }
    }

    /// Snapshot of the supervisor without probing the child
    pub async fn status(&self) -> PreviewStatus {
        let inner = self.inner.lock().await;
        let process = inner.process.as_ref();

        PreviewStatus {
            state: inner.state,
            pid: process.and_then(|p| p.pid()),
            port: self.config.port,
            script: process.map(|p| p.script().to_path_buf()),
            started_at: process.map(|p| p.started_at()),
            display_url: self.display_url(),
            last_message: inner.last_message.clone(),
            launch_count: self.launch_count(),
            detected_port: process.and_then(|p| p.detected_port()),
            cooldown_remaining_secs: inner.cooldown.remaining().map(|d| d.as_secs_f64()),
        }
    }

    /// Output captured from the current or most recent child
    pub async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<PreviewLog> {
        let output = {
            let inner = self.inner.lock().await;
            inner.last_output.clone()
        };

        match output {
            Some(output) => output.entries(since, limit).await,
            None => Vec::new(),
        }
    }

    async fn check_health(&self, inner: &mut SupervisorInner) -> HealthVerdict {
        health::check(
            &mut inner.process,
            &self.config.probe_host(),
            &self.config.health_policy(),
        )
        .await
    }

    async fn launch_locked(&self, inner: &mut SupervisorInner) -> PreviewResult<PreviewOutcome> {
        let idle_state = |inner: &SupervisorInner| {
            if inner.process.is_some() {
                PreviewState::Unhealthy
            } else {
                PreviewState::Stopped
            }
        };

        let script = match find_target(&self.config.sandbox_dir, &self.config.target_name) {
            Ok(script) => script,
            Err(e @ PreviewError::AmbiguousTarget { .. }) => {
                inner.state = idle_state(inner);
                inner.last_message = Some(e.to_string());
                return Err(e);
            }
            Err(e) => {
                warn!("Cannot start preview app: {}", e);
                inner.state = idle_state(inner);
                let message = e.to_string();
                inner.last_message = Some(message.clone());
                return Ok(PreviewOutcome::failure(OutcomeKind::TargetNotFound, message));
            }
        };

        if let Some(remaining) = inner.cooldown.remaining() {
            let remaining_secs = remaining.as_secs_f64();
            info!(
                "Preview app restart on cooldown, {:.1}s remaining",
                remaining_secs
            );
            let message = PreviewError::CooldownActive { remaining_secs }.to_string();
            inner.state = PreviewState::CoolingDown;
            inner.last_message = Some(message.clone());
            let mut outcome =
                PreviewOutcome::failure(OutcomeKind::CooldownActive { remaining_secs }, message);
            // A child that is still up can keep being displayed meanwhile
            if inner.process.is_some() {
                outcome.display_url = Some(self.display_url());
            }
            return Ok(outcome);
        }

        // Stop always precedes start on the preview port
        if let Some(mut previous) = inner.process.take() {
            let termination = previous
                .terminate(self.config.terminate_grace, self.config.kill_wait)
                .await;
            info!("Previous preview process stopped ({})", termination.as_str());
        }

        inner.cooldown.mark();
        inner.state = PreviewState::Starting;

        let port = self.config.port;
        if !wait_for_port_release(
            &self.config.host,
            port,
            self.config.port_wait_attempts,
            self.config.port_wait_interval,
        )
        .await
        {
            let message = PreviewError::PortUnavailable { port }.to_string();
            error!("{}", message);
            inner.state = PreviewState::Unhealthy;
            inner.last_message = Some(message.clone());
            return Ok(PreviewOutcome::failure(OutcomeKind::PortUnavailable, message));
        }

        let spec = LaunchSpec {
            interpreter: self.config.interpreter.clone(),
            script,
            host: self.config.host.clone(),
            port,
        };
        info!(
            "Starting preview app from `{}` on port {}...",
            spec.script.display(),
            port
        );

        let mut process = match SupervisedProcess::start(&spec).await {
            Ok(process) => process,
            Err(e) => {
                let message = format!("Failed to start preview app: {}", e);
                error!("{}", message);
                inner.state = PreviewState::Unhealthy;
                inner.last_message = Some(message.clone());
                return Ok(PreviewOutcome::failure(OutcomeKind::LaunchFailed, message));
            }
        };
        self.launches.fetch_add(1, Ordering::SeqCst);
        inner.last_output = Some(process.output_buffer());

        let ready = health::wait_until_ready(
            &mut process,
            &self.config.probe_host(),
            self.config.startup_timeout,
            self.config.startup_poll_interval,
            self.config.probe_timeout,
        )
        .await;

        match ready {
            Ok(()) => {
                info!(
                    "Preview app started successfully (PID: {:?})",
                    process.pid()
                );
                inner.process = Some(process);
                inner.state = PreviewState::Healthy;
                let message = format!("Preview running at {}", self.display_url());
                inner.last_message = Some(message.clone());
                Ok(PreviewOutcome::success(
                    OutcomeKind::Started,
                    message,
                    self.display_url(),
                ))
            }
            Err(PreviewError::ExitedDuringStartup { code, output }) => {
                let message = format!(
                    "Preview app crashed during startup (exit code {:?}):\n{}",
                    code, output
                );
                error!("{}", message);
                inner.state = PreviewState::Unhealthy;
                inner.last_message = Some(message.clone());
                Ok(PreviewOutcome::failure(
                    OutcomeKind::ExitedDuringStartup,
                    message,
                ))
            }
            Err(e) => {
                let mut message = e.to_string();
                if let PreviewError::StartupTimeout { output, .. } = &e {
                    message.push('\n');
                    message.push_str(output);
                }
                if let Some(announced) = process.detected_port() {
                    message.push_str(&format!(
                        "\nThe app announced port {} instead of {}; make sure it honours --server-port.",
                        announced, port
                    ));
                }
                error!("{}", message);

                // Left running for diagnostics; the next ensure_running retries it
                if process.poll().await == ProcessState::Running {
                    inner.process = Some(process);
                }
                inner.state = PreviewState::Unhealthy;
                inner.last_message = Some(message.clone());
                Ok(PreviewOutcome::failure(OutcomeKind::StartupTimeout, message))
            }
        }
    }
}

/// Drive a start/stop sequence on its own task.
///
/// Callers such as HTTP handlers can be dropped at any await point; the
/// sequence must still finish so the state never sticks at `Starting` and a
/// freshly launched child is not killed with the dropped future.
async fn run_to_completion<F>(sequence: F) -> PreviewResult<PreviewOutcome>
where
    F: Future<Output = PreviewResult<PreviewOutcome>> + Send + 'static,
{
    match tokio::spawn(sequence).await {
        Ok(result) => result,
        Err(e) => {
            error!("Preview launch task failed: {}", e);
            Ok(PreviewOutcome::failure(
                OutcomeKind::LaunchFailed,
                format!("Preview launch task failed: {}", e),
            ))
        }
    }
}
