//! Server configuration.
//!
//! Sources, highest precedence first: command-line flags (or their
//! `BLOGLINE_*` environment variables), the optional TOML file given with
//! `--config`, built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use blogline_infra::{DbConfigError, PostgresOptions};
use blogline_observability::{LogConfig, LogFormat, ObservabilityError};

pub const DEFAULT_ADDR: &str = "0.0.0.0:6666";

/// Longest accepted token lifetime (30 days).
pub const MAX_JWT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "blogline", version, about = "Users and posts over JSON/HTTP")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "BLOGLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, `host:port`.
    #[arg(long, env = "BLOGLINE_ADDR")]
    pub addr: Option<String>,

    /// Postgres URL; without one the server keeps data in memory.
    #[arg(long, env = "BLOGLINE_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "BLOGLINE_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// `json` or `pretty`.
    #[arg(long, env = "BLOGLINE_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Default filter when `RUST_LOG` is unset.
    #[arg(long, env = "BLOGLINE_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("server address cannot be empty")]
    EmptyAddr,

    #[error("invalid server address: {0}")]
    InvalidAddr(String),

    #[error("invalid server port: {0}")]
    InvalidPort(String),

    #[error("jwt secret cannot be empty")]
    EmptyJwtSecret,

    #[error("jwt ttl-secs must be between 1 and 2592000 (30 days)")]
    InvalidJwtTtl,

    #[error("cors allowed-origins cannot be empty")]
    NoCorsOrigins,

    #[error("database: {0}")]
    Database(#[from] DbConfigError),

    #[error("log: {0}")]
    Log(#[from] ObservabilityError),
}

#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 2 * 60 * 60,
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub addr: String,

    /// Show raw text of unclassified failures to callers.
    pub expose_internal_errors: bool,

    pub jwt: JwtConfig,

    /// `None` runs on the in-memory store.
    pub database: Option<PostgresOptions>,

    pub log: LogConfig,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            expose_internal_errors: false,
            jwt: JwtConfig::default(),
            database: None,
            log: LogConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Resolve file + flags into a validated config.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(cli)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(addr) = &cli.addr {
            self.addr = addr.clone();
        }
        if let Some(url) = &cli.database_url {
            self.database.get_or_insert_with(PostgresOptions::default).url = url.clone();
        }
        if let Some(secret) = &cli.jwt_secret {
            self.jwt.secret = secret.clone();
        }
        if let Some(format) = &cli.log_format {
            self.log.format = format.parse::<LogFormat>()?;
        }
        if let Some(level) = &cli.log_level {
            self.log.level = level.clone();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_addr(&self.addr)?;

        if self.jwt.secret.is_empty() {
            return Err(ConfigError::EmptyJwtSecret);
        }
        if !(1..=MAX_JWT_TTL_SECS).contains(&self.jwt.ttl_secs) {
            return Err(ConfigError::InvalidJwtTtl);
        }
        if let Some(db) = &self.database {
            db.validate()?;
        }
        if self.cors.allowed_origins.is_empty() {
            return Err(ConfigError::NoCorsOrigins);
        }
        Ok(())
    }
}

fn validate_addr(addr: &str) -> Result<(), ConfigError> {
    if addr.is_empty() {
        return Err(ConfigError::EmptyAddr);
    }
    let (_, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidAddr(addr.to_string()))?;
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(ConfigError::InvalidPort(port.to_string())),
    }
}
