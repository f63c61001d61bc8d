//! Prometheus gauges built from SCP server snapshots.

pub mod error;
pub mod registry;
pub mod status;
pub mod updater;

use async_trait::async_trait;

pub use error::MetricsError;
pub use registry::ScpMetrics;
pub use updater::ScpMetricsUpdater;

/// One collection + publish cycle.
#[async_trait]
pub trait MetricsUpdater: Send + Sync {
    async fn update_metrics(&self) -> Result<(), MetricsError>;
}
