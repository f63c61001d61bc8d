use thiserror::Error;

use crate::collector::CollectorError;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Collecting server data failed: {0}")]
    Collect(#[from] CollectorError),
    #[error("Metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
}
