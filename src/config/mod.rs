//! Typed configuration from an optional TOML file and environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every field has
//! a default, so an empty environment yields a usable server config.

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 8002;
pub const DEFAULT_MAX_LINE_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the line-protocol listener binds to.
    pub bind: SocketAddr,
    /// Longest accepted command line, terminator included.
    pub max_line_bytes: usize,
    pub log_level: String,
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            log_level: "info".to_string(),
            otel_endpoint: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables over the defaults.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Load configuration from a TOML file. Missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// File (if any) first, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env()
    }

    fn with_env(mut self) -> Result<Self> {
        if let Some(bind) = optional_var("BARBERSHOP_BIND") {
            self.bind = bind.parse().map_err(|e| {
                Error::Config(format!("BARBERSHOP_BIND {bind:?} is not a socket address: {e}"))
            })?;
        }
        if let Some(max) = optional_var("BARBERSHOP_MAX_LINE_BYTES") {
            self.max_line_bytes = max.parse().map_err(|e| {
                Error::Config(format!("BARBERSHOP_MAX_LINE_BYTES {max:?} is not a size: {e}"))
            })?;
        }
        if let Some(level) = optional_var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(endpoint) = optional_var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        self.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.max_line_bytes < 2 {
            return Err(Error::Config(format!(
                "max_line_bytes must be at least 2, got {}",
                self.max_line_bytes
            )));
        }
        Ok(self)
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
