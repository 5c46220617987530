//! Likable Preview - supervisor for the live preview of a generated app
//!
//! This crate keeps exactly one preview process alive next to the main UI:
//! it locates the target script inside the sandbox, launches it on the
//! preview port, checks its health on demand, restarts it (rate-limited by a
//! cooldown) when it dies, and renders an iframe or an error panel for the UI.

pub mod api;
pub mod config;
pub mod cooldown;
pub mod health;
pub mod output;
pub mod probe;
pub mod process;
pub mod render;
pub mod supervisor;
pub mod target;
pub mod types;
pub mod validation;

// Re-export key types and functions for easier use
pub use config::{DisplayMode, PreviewConfig};
pub use health::{HealthPolicy, HealthVerdict};
pub use probe::{is_port_available, probe_connect, wait_for_port_release};
pub use process::{LaunchSpec, ProcessState, SupervisedProcess, Termination};
pub use render::{render_error_panel, render_iframe};
pub use supervisor::PreviewSupervisor;
pub use target::find_target;
pub use types::{
    ApiResponse, LogType, OutcomeKind, PreviewError, PreviewLog, PreviewOutcome, PreviewResult,
    PreviewState, PreviewStatus,
};

/// Version information for the preview crate.
///
/// This constant contains the version string from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
