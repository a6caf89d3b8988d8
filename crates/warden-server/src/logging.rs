//! Logging initialization
//!
//! `RUST_LOG` wins over the configured level when set. Audit events use the
//! `warden::audit` target, so they can be filtered separately:
//!
//! ```text
//! RUST_LOG=info,warden::audit=warn
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Where log lines go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard error
    #[default]
    Stderr,
    /// Standard output
    Stdout,
    /// Discard everything
    None,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub structured: bool,
    /// Output stream
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
            output: LogOutput::Stderr,
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already set.
    pub fn init(&self) -> io::Result<()> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.output {
            LogOutput::None => Ok(()),
            LogOutput::Stderr => install(self.structured, filter, io::stderr),
            LogOutput::Stdout => install(self.structured, filter, io::stdout),
        }
    }
}

fn install<W>(structured: bool, filter: EnvFilter, writer: W) -> io::Result<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(filter);

    if structured {
        subscriber
            .with(fmt::layer().json().with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(writer))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}
