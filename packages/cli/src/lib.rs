pub mod config;
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Config, ConfigError};
pub use server::{create_router, run_server};

/// Initialize the tracing subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();
}
