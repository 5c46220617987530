// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Likable

// Host Server Configuration
pub const LIKABLE_PORT: &str = "LIKABLE_PORT";
pub const LIKABLE_HOST: &str = "LIKABLE_HOST";
pub const PORT: &str = "PORT"; // Legacy

// Preview Process Configuration
pub const LIKABLE_PREVIEW_PORT: &str = "LIKABLE_PREVIEW_PORT";
pub const LIKABLE_PREVIEW_HOST: &str = "LIKABLE_PREVIEW_HOST";
pub const LIKABLE_PREVIEW_INTERPRETER: &str = "LIKABLE_PREVIEW_INTERPRETER";

// Sandbox & Target Script
pub const LIKABLE_SANDBOX_DIR: &str = "LIKABLE_SANDBOX_DIR";
pub const LIKABLE_PREVIEW_TARGET: &str = "LIKABLE_PREVIEW_TARGET";

// Restart Cooldown
pub const LIKABLE_PREVIEW_COOLDOWN_SECS: &str = "LIKABLE_PREVIEW_COOLDOWN_SECS";

// Health Probing
pub const LIKABLE_PREVIEW_PROBE_ATTEMPTS: &str = "LIKABLE_PREVIEW_PROBE_ATTEMPTS";
pub const LIKABLE_PREVIEW_PROBE_TIMEOUT_MS: &str = "LIKABLE_PREVIEW_PROBE_TIMEOUT_MS";
pub const LIKABLE_PREVIEW_PROBE_INTERVAL_MS: &str = "LIKABLE_PREVIEW_PROBE_INTERVAL_MS";

// Startup & Port Release
pub const LIKABLE_PREVIEW_PORT_WAIT_ATTEMPTS: &str = "LIKABLE_PREVIEW_PORT_WAIT_ATTEMPTS";
pub const LIKABLE_PREVIEW_PORT_WAIT_INTERVAL_MS: &str = "LIKABLE_PREVIEW_PORT_WAIT_INTERVAL_MS";
pub const LIKABLE_PREVIEW_STARTUP_TIMEOUT_SECS: &str = "LIKABLE_PREVIEW_STARTUP_TIMEOUT_SECS";

// Termination
pub const LIKABLE_PREVIEW_TERMINATE_GRACE_SECS: &str = "LIKABLE_PREVIEW_TERMINATE_GRACE_SECS";
pub const LIKABLE_PREVIEW_KILL_WAIT_SECS: &str = "LIKABLE_PREVIEW_KILL_WAIT_SECS";

// Display
pub const LIKABLE_PREVIEW_PROXY_PATH: &str = "LIKABLE_PREVIEW_PROXY_PATH";
pub const LIKABLE_PREVIEW_IFRAME_HEIGHT: &str = "LIKABLE_PREVIEW_IFRAME_HEIGHT";
