use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{MetricsError, MetricsUpdater, ScpMetrics};
use crate::collector::ServerCollector;

/// Publishes collector snapshots into [`ScpMetrics`].
pub struct ScpMetricsUpdater {
    collector: Arc<dyn ServerCollector>,
    metrics: ScpMetrics,
}

impl ScpMetricsUpdater {
    pub fn new(collector: Arc<dyn ServerCollector>, metrics: ScpMetrics) -> Self {
        Self { collector, metrics }
    }
}

#[async_trait]
impl MetricsUpdater for ScpMetricsUpdater {
    async fn update_metrics(&self) -> Result<(), MetricsError> {
        let servers = self.collector.collect_server_data().await?;
        debug!(servers = servers.len(), "collected server data");
        self.metrics.record(&servers, Utc::now());
        Ok(())
    }
}
