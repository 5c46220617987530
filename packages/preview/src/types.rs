use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of the supervised preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
    Stopped,
    Starting,
    Healthy,
    Unhealthy,
    CoolingDown,
}

impl PreviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewState::Stopped => "stopped",
            PreviewState::Starting => "starting",
            PreviewState::Healthy => "healthy",
            PreviewState::Unhealthy => "unhealthy",
            PreviewState::CoolingDown => "cooling_down",
        }
    }
}

/// Log entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Stdout,
    Stderr,
    System,
}

/// Captured line of preview process output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewLog {
    pub timestamp: DateTime<Utc>,
    pub log_type: LogType,
    pub message: String,
}

/// What a call to `ensure_running` or `restart` ended up doing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The existing child passed its health check and was left untouched
    AlreadyRunning,
    /// A fresh child was launched and answered on the preview port
    Started,
    /// A restart was requested inside the cooldown window; nothing changed
    CooldownActive { remaining_secs: f64 },
    TargetNotFound,
    PortUnavailable,
    LaunchFailed,
    ExitedDuringStartup,
    StartupTimeout,
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::AlreadyRunning | OutcomeKind::Started)
    }
}

/// Structured result handed back to the UI layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewOutcome {
    pub ok: bool,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    pub message: String,
    pub display_url: Option<String>,
}

impl PreviewOutcome {
    pub fn success(kind: OutcomeKind, message: impl Into<String>, display_url: String) -> Self {
        Self {
            ok: kind.is_success(),
            kind,
            message: message.into(),
            display_url: Some(display_url),
        }
    }

    pub fn failure(kind: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            kind,
            message: message.into(),
            display_url: None,
        }
    }

    pub fn is_cooldown(&self) -> bool {
        matches!(self.kind, OutcomeKind::CooldownActive { .. })
    }
}

/// Point-in-time view of the supervisor, without probing the child
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewStatus {
    pub state: PreviewState,
    pub pid: Option<u32>,
    pub port: u16,
    pub script: Option<PathBuf>,
    pub started_at: Option<DateTime<Utc>>,
    pub display_url: String,
    pub last_message: Option<String>,
    pub launch_count: u64,
    /// Port the child announced in its own output, when it differs from the assigned one
    pub detected_port: Option<u16>,
    pub cooldown_remaining_secs: Option<f64>,
}

/// Error types for preview operations
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("No {file_name} found in the {} directory.", .sandbox.display())]
    TargetNotFound { sandbox: PathBuf, file_name: String },

    #[error(
        "Multiple {file_name} files found in sandbox directory: {}",
        join_paths(.candidates)
    )]
    AmbiguousTarget {
        file_name: String,
        candidates: Vec<PathBuf>,
    },

    #[error("Invalid target name '{name}': {reason}")]
    InvalidTargetName { name: String, reason: String },

    #[error("Failed to launch preview process '{command}': {reason}")]
    LaunchError { command: String, reason: String },

    #[error("Preview app exited during startup (exit code {})", describe_code(.code))]
    ExitedDuringStartup { code: Option<i32>, output: String },

    #[error("Preview app did not accept connections on port {port} within {timeout_secs:.1}s")]
    StartupTimeout {
        port: u16,
        timeout_secs: f64,
        output: String,
    },

    #[error("Preview process {pid} may still be running after force-kill attempt")]
    TerminationUncertain { pid: u32 },

    #[error("Preview app on cooldown for {remaining_secs:.1} more seconds")]
    CooldownActive { remaining_secs: f64 },

    #[error("Port {port} is not available")]
    PortUnavailable { port: u16 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Request/Response types for API endpoints

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewLogsResponse {
    pub logs: Vec<PreviewLog>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub termination: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error<E: ToString>(error: E) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}
