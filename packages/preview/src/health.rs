// ABOUTME: Health monitor for the preview process
// ABOUTME: Process exit is checked first and is authoritative; reachability is probed with bounded retries

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::probe::probe_connect;
use crate::process::{ProcessState, SupervisedProcess};
use crate::types::{PreviewError, PreviewResult};

/// How long to wait for reader tasks after an exit, so the summary is complete
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_millis(500);

/// Retry budget for a single health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(3),
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Outcome of one health check; recomputed on demand, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub process_alive: bool,
    pub port_reachable: bool,
    pub message: String,
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        self.process_alive && self.port_reachable
    }

    fn not_started() -> Self {
        Self {
            process_alive: false,
            port_reachable: false,
            message: "not started".to_string(),
        }
    }
}

/// Check the recorded process, clearing `slot` if it has exited.
pub async fn check(
    slot: &mut Option<SupervisedProcess>,
    host: &str,
    policy: &HealthPolicy,
) -> HealthVerdict {
    let Some(process) = slot.as_mut() else {
        return HealthVerdict::not_started();
    };

    if let ProcessState::Exited { code, .. } = process.poll().await {
        process.drain_output(OUTPUT_DRAIN_WAIT).await;
        let output = process.output_summary().await;
        warn!(
            "Preview process {:?} died (exit code {:?}): {}",
            process.pid(),
            code,
            output
        );
        *slot = None;
        return HealthVerdict {
            process_alive: false,
            port_reachable: false,
            message: format!("Process exited (code {:?}).\n{}", code, output),
        };
    }

    let port = process.port();
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if probe_connect(host, port, policy.attempt_timeout).await {
            return HealthVerdict {
                process_alive: true,
                port_reachable: true,
                message: "Healthy".to_string(),
            };
        }

        if attempt < attempts {
            debug!(
                "Health check attempt {}/{} failed, retrying...",
                attempt, attempts
            );
            sleep(policy.retry_interval).await;
        }
    }

    HealthVerdict {
        process_alive: true,
        port_reachable: false,
        message: format!("Not responsive on port {} after {} attempts", port, attempts),
    }
}

/// Wait for a freshly launched child to accept connections.
///
/// The exit check runs before every probe, so a child that crashes on
/// startup is reported as soon as it is reaped rather than after the whole
/// probe budget.
///
/// # Errors
///
/// * `PreviewError::ExitedDuringStartup` - the child exited before answering
/// * `PreviewError::StartupTimeout` - the child is alive but never answered
pub async fn wait_until_ready(
    process: &mut SupervisedProcess,
    host: &str,
    startup_timeout: Duration,
    poll_interval: Duration,
    probe_timeout: Duration,
) -> PreviewResult<()> {
    let deadline = Instant::now() + startup_timeout;
    let port = process.port();

    loop {
        if let ProcessState::Exited { code, .. } = process.poll().await {
            process.drain_output(OUTPUT_DRAIN_WAIT).await;
            return Err(PreviewError::ExitedDuringStartup {
                code,
                output: process.output_summary().await,
            });
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        if probe_connect(host, port, probe_timeout.min(remaining)).await {
            info!(
                "Preview app is accepting connections on port {} after {:?}",
                port,
                process.uptime()
            );
            return Ok(());
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(poll_interval.min(remaining)).await;
    }

    warn!(
        "Preview app started but not accepting connections on port {} after {:?}",
        port, startup_timeout
    );
    Err(PreviewError::StartupTimeout {
        port,
        timeout_secs: startup_timeout.as_secs_f64(),
        output: process.output_summary().await,
    })
}
