//! Tracing subscriber setup.
//!
//! Logs go to stderr so the stdio transport keeps stdout for JSON-RPC.
//! `RUST_LOG` overrides `--log-level`.

use crate::config::Config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the filter from `RUST_LOG`, falling back to `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber for logging.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<(), String> {
    let subscriber = tracing_subscriber::registry().with(env_filter(&config.log_level));

    let result = if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    result.map_err(|e| e.to_string())
}
