//! Process configuration (layered: command-line flag > environment > `.env` > default).

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser};
use tokio::net::lookup_host;

use crate::error::ExporterError;
use crate::refresher::DEFAULT_REFRESH_INTERVAL;

/// Runtime settings, parsed once at startup and passed by reference.
#[derive(Parser, Debug, Clone)]
#[command(name = "scp-exporter", version, about = "Prometheus exporter for netcup SCP")]
pub struct ExporterConfig {
    /// Host to bind the HTTP server to (empty: all interfaces)
    #[arg(long, env = "HOST", default_value = "")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "PORT", default_value_t = 2008)]
    pub port: u16,

    /// SCP refresh token; omit for first-time setup
    #[arg(long, env = "REFRESH_TOKEN", default_value = "", hide_env_values = true)]
    pub refresh_token: String,

    /// Revoke the given refresh token and exit
    #[arg(long, env = "REVOKE_TOKEN")]
    pub revoke_token: bool,

    /// Print details about the given refresh token and exit
    #[arg(long, env = "GET_TOKEN_DETAILS")]
    pub get_token_details: bool,

    #[command(flatten)]
    pub log: LogConfig,

    #[arg(skip = DEFAULT_REFRESH_INTERVAL)]
    pub refresh_interval: Duration,
}

/// Logging settings.
#[derive(Args, Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error) or a tracing filter directive
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "info")]
    pub level: String,

    /// Emit JSON formatted logs
    #[arg(long = "log-json", env = "LOG_JSON")]
    pub json: bool,
}

impl ExporterConfig {
    /// Parse from the process arguments after loading `.env` if present.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv(); // optional
        Self::parse()
    }

    /// Resolve the listen address; an empty host binds every interface.
    pub async fn listen_addr(&self) -> Result<SocketAddr, ExporterError> {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            self.host.as_str()
        };
        lookup_host((host, self.port))
            .await?
            .next()
            .ok_or_else(|| ExporterError::Config(format!("cannot resolve listen host {host:?}")))
    }
}
