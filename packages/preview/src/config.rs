// ABOUTME: Preview supervisor configuration
// ABOUTME: Defaults for every port, timeout and retry budget, overridable from the environment

use likable_config::constants;
use likable_config::env::{
    env_string, env_string_or_default, parse_env_millis, parse_env_or_default_with_validation,
    parse_env_secs,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::health::HealthPolicy;
use crate::probe::connect_host;

pub const DEFAULT_PREVIEW_PORT: u16 = 7861;
pub const DEFAULT_PREVIEW_HOST: &str = "0.0.0.0";
pub const DEFAULT_SANDBOX_DIR: &str = "sandbox";
pub const DEFAULT_TARGET_NAME: &str = "app.py";
pub const DEFAULT_INTERPRETER: &str = "python";
pub const DEFAULT_IFRAME_HEIGHT: &str = "500px";

/// How the UI layer reaches the preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DisplayMode {
    /// `http://<host>:<port>`, for local runs
    Direct,
    /// A path served by a reverse proxy in front of both servers, e.g. `/preview/`
    Proxy { path: String },
}

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub port: u16,
    /// Address handed to the child through `--server-name`
    pub host: String,
    pub sandbox_dir: PathBuf,
    pub target_name: String,
    pub interpreter: String,
    pub cooldown: Duration,
    pub probe_attempts: u32,
    pub probe_timeout: Duration,
    pub probe_interval: Duration,
    pub port_wait_attempts: u32,
    pub port_wait_interval: Duration,
    pub startup_timeout: Duration,
    pub startup_poll_interval: Duration,
    pub terminate_grace: Duration,
    pub kill_wait: Duration,
    pub display_mode: DisplayMode,
    pub iframe_height: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PREVIEW_PORT,
            host: DEFAULT_PREVIEW_HOST.to_string(),
            sandbox_dir: PathBuf::from(DEFAULT_SANDBOX_DIR),
            target_name: DEFAULT_TARGET_NAME.to_string(),
            interpreter: DEFAULT_INTERPRETER.to_string(),
            cooldown: Duration::from_secs(10),
            probe_attempts: 3,
            probe_timeout: Duration::from_secs(3),
            probe_interval: Duration::from_secs(1),
            port_wait_attempts: 10,
            port_wait_interval: Duration::from_millis(500),
            startup_timeout: Duration::from_secs(10),
            startup_poll_interval: Duration::from_millis(250),
            terminate_grace: Duration::from_secs(5),
            kill_wait: Duration::from_secs(2),
            display_mode: DisplayMode::Direct,
            iframe_height: DEFAULT_IFRAME_HEIGHT.to_string(),
        }
    }
}

impl PreviewConfig {
    /// Build a configuration from `LIKABLE_PREVIEW_*` variables.
    ///
    /// Unset variables take their default silently; set but invalid values
    /// are logged and replaced by the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let display_mode = match env_string(constants::LIKABLE_PREVIEW_PROXY_PATH) {
            Some(path) => DisplayMode::Proxy {
                path: normalize_proxy_path(&path),
            },
            None => DisplayMode::Direct,
        };

        Self {
            port: parse_env_or_default_with_validation(
                constants::LIKABLE_PREVIEW_PORT,
                defaults.port,
                |p| p > 0,
            ),
            host: env_string_or_default(constants::LIKABLE_PREVIEW_HOST, &defaults.host),
            sandbox_dir: env_string(constants::LIKABLE_SANDBOX_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.sandbox_dir),
            target_name: env_string_or_default(
                constants::LIKABLE_PREVIEW_TARGET,
                &defaults.target_name,
            ),
            interpreter: env_string_or_default(
                constants::LIKABLE_PREVIEW_INTERPRETER,
                &defaults.interpreter,
            ),
            // Zero disables the cooldown gate entirely
            cooldown: parse_env_secs(
                constants::LIKABLE_PREVIEW_COOLDOWN_SECS,
                defaults.cooldown,
                true,
            ),
            probe_attempts: parse_env_or_default_with_validation(
                constants::LIKABLE_PREVIEW_PROBE_ATTEMPTS,
                defaults.probe_attempts,
                |v| (1..=20).contains(&v),
            ),
            probe_timeout: parse_env_millis(
                constants::LIKABLE_PREVIEW_PROBE_TIMEOUT_MS,
                defaults.probe_timeout,
            ),
            probe_interval: parse_env_millis(
                constants::LIKABLE_PREVIEW_PROBE_INTERVAL_MS,
                defaults.probe_interval,
            ),
            port_wait_attempts: parse_env_or_default_with_validation(
                constants::LIKABLE_PREVIEW_PORT_WAIT_ATTEMPTS,
                defaults.port_wait_attempts,
                |v| (1..=120).contains(&v),
            ),
            port_wait_interval: parse_env_millis(
                constants::LIKABLE_PREVIEW_PORT_WAIT_INTERVAL_MS,
                defaults.port_wait_interval,
            ),
            startup_timeout: parse_env_secs(
                constants::LIKABLE_PREVIEW_STARTUP_TIMEOUT_SECS,
                defaults.startup_timeout,
                false,
            ),
            startup_poll_interval: defaults.startup_poll_interval,
            terminate_grace: parse_env_secs(
                constants::LIKABLE_PREVIEW_TERMINATE_GRACE_SECS,
                defaults.terminate_grace,
                true,
            ),
            kill_wait: parse_env_secs(
                constants::LIKABLE_PREVIEW_KILL_WAIT_SECS,
                defaults.kill_wait,
                false,
            ),
            display_mode,
            iframe_height: env_string_or_default(
                constants::LIKABLE_PREVIEW_IFRAME_HEIGHT,
                &defaults.iframe_height,
            ),
        }
    }

    /// Host used for connect probes; wildcard bind addresses go through loopback
    pub fn probe_host(&self) -> String {
        connect_host(&self.host)
    }

    /// URL or path the UI layer should point its iframe at
    pub fn display_url(&self) -> String {
        match &self.display_mode {
            DisplayMode::Direct => format!("http://{}:{}", self.probe_host(), self.port),
            DisplayMode::Proxy { path } => path.clone(),
        }
    }

    pub fn health_policy(&self) -> HealthPolicy {
        HealthPolicy {
            attempts: self.probe_attempts,
            attempt_timeout: self.probe_timeout,
            retry_interval: self.probe_interval,
        }
    }
}

/// Proxy paths always start and end with a slash so relative assets resolve
fn normalize_proxy_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
