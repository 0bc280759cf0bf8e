//! Tracing and logging setup.
//!
//! The binary builds a [`LogConfig`] and calls [`init`] once at startup;
//! nothing else in the workspace touches the global subscriber.

use serde::Deserialize;
use thiserror::Error;

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::init;

/// Output format of log lines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl core::str::FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(ObservabilityError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LogConfig {
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset (e.g. `info`, `blogline_api=debug`).
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("unknown log format '{0}' (expected json or pretty)")]
    UnknownFormat(String),

    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}
