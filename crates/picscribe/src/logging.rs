//! Subscriber setup for the binary. Library code only emits through the
//! `log` and `tracing` macros.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global subscriber is already installed: {0}")]
    AlreadySet(String),
}

/// Builds the filter: `RUST_LOG` wins over `level`.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidFilter {
            filter: level.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Installs a stderr `fmt` subscriber and routes `log` records into it.
pub fn init(level: &str, json: bool) -> Result<(), LoggingError> {
    let filter = env_filter(level)?;

    let fmt_layer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_target(false).with_writer(std::io::stderr).boxed()
    };

    let subscriber = Registry::default().with(fmt_layer).with(filter);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadySet(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| LoggingError::AlreadySet(e.to_string()))?;
    Ok(())
}
