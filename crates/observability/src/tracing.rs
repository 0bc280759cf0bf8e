//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::{LogConfig, LogFormat, ObservabilityError};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, ObservabilityError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ObservabilityError::Filter(e.to_string())),
    }
}

/// Install the process subscriber.
///
/// Fails with [`ObservabilityError::AlreadyInstalled`] instead of replacing
/// an existing subscriber.
pub fn init(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = build_filter(config)?;

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .with_current_span(true)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    result.map_err(|_| ObservabilityError::AlreadyInstalled)
}
