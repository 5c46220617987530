use likable_config::constants;
use likable_config::env::{env_string_or_default, env_string_with_fallback};
use std::net::IpAddr;
use std::num::ParseIntError;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid host address: {0}")]
    InvalidHost(String),
    #[error("Host port {0} is also the preview port; choose a different LIKABLE_PORT or LIKABLE_PREVIEW_PORT")]
    PortConflict(u16),
}

/// Host server configuration; preview settings live in `PreviewConfig`
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub host: IpAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // LIKABLE_PORT wins over the legacy PORT
        let port = match env_string_with_fallback(constants::LIKABLE_PORT, constants::PORT) {
            Some(port_str) => parse_port(&port_str)?,
            None => DEFAULT_PORT,
        };

        let host_str = env_string_or_default(constants::LIKABLE_HOST, DEFAULT_HOST);
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_str.clone()))?;

        Ok(Config { port, host })
    }

    /// The host server and the preview child must never share a port
    pub fn check_preview_port(&self, preview_port: u16) -> Result<(), ConfigError> {
        if self.port == preview_port {
            return Err(ConfigError::PortConflict(self.port));
        }
        Ok(())
    }
}

pub fn parse_port(value: &str) -> Result<u16, ConfigError> {
    let port = value.trim().parse::<u16>()?;

    // Validate port is in valid range
    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }
    Ok(port)
}
