//! Console subscriber setup.

use crate::errors::{EzTemplatesError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format of the console subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Builds the event filter. `RUST_LOG` wins over `default_filter`.
pub fn build_filter(default_filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| EzTemplatesError::Logging(e.to_string()))
}

/// Installs a human-readable global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    init_tracing_with(default_filter, LogFormat::Pretty)
}

/// Installs a global subscriber writing `format` to stderr.
pub fn init_tracing_with(default_filter: &str, format: LogFormat) -> Result<()> {
    let filter = build_filter(default_filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| EzTemplatesError::Logging(e.to_string()))
}
