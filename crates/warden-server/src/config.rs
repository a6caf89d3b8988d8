//! Server configuration
//!
//! Loaded from a TOML, YAML or JSON file with `WARDEN__`-prefixed
//! environment overrides, e.g. `WARDEN__PORT=9000` or
//! `WARDEN__AUTH__POLICY__TTL=900`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use warden_auth::AuthorityConfig;

use crate::logging::LoggingConfig;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WARDEN";

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: String,
    /// Port to bind
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub body_limit: usize,
    /// Logging
    pub logging: LoggingConfig,
    /// Token authority
    pub auth: AuthorityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            body_limit: 64 * 1024,
            logging: LoggingConfig::default(),
            auth: AuthorityConfig::default(),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Parsed but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is picked from the extension. Environment variables
    /// with the [`ENV_PREFIX`] prefix override file settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unknown
    /// extension, or does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment())
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from defaults and environment variables only
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment())
            .build()?;
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check cross-field rules
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a bad bind address, a zero body
    /// limit, or an invalid token policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.body_limit == 0 {
            return Err(ConfigError::Invalid("body_limit must be positive".to_string()));
        }
        self.auth
            .policy
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Address to listen on
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .or_else(|_| format!("[{}]:{}", self.bind_address, self.port).parse())
            .map_err(|_| {
                ConfigError::Invalid(format!("invalid bind address '{}'", self.bind_address))
            })
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
