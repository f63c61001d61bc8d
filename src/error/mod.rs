//! Application-level error type.

use thiserror::Error;

use crate::auth::AuthError;
use crate::metrics::MetricsError;
use crate::refresher::RefreshError;

/// Errors that end the exporter process.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for ExporterError {
    fn from(error: prometheus::Error) -> Self {
        Self::Metrics(MetricsError::Registry(error))
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;
