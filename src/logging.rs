//! Tracing subscriber setup.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::ExporterError;

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &LogConfig) -> Result<(), ExporterError> {
    let filter = env_filter(&config.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder
            .with_ansi(std::io::stdout().is_terminal())
            .try_init()
    };
    installed.map_err(|e| ExporterError::Config(format!("cannot install logger: {e}")))
}

/// Accepts a bare level or a full filter directive such as
/// `scp_exporter=debug,reqwest=warn`.
pub fn env_filter(level: &str) -> Result<EnvFilter, ExporterError> {
    EnvFilter::try_new(level.trim())
        .map_err(|e| ExporterError::Config(format!("invalid log level {level:?}: {e}")))
}
