//! Fixed-interval loop that keeps the credential fresh and publishes metrics.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, Authenticator};
use crate::metrics::{MetricsError, MetricsUpdater};

/// How far ahead of expiry the access token is renewed, so it stays valid
/// for the whole collection that follows the check.
pub const AUTH_EXPIRY_BUFFER: Duration = Duration::from_secs(15);

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Classified failure of one tick.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Renewing the credential failed. Stops the loop.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
    /// Collecting or publishing failed. The loop keeps going.
    #[error("Metrics update failed: {0}")]
    Metric(#[from] MetricsError),
}

impl RefreshError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Auth(_) => true,
            Self::Metric(_) => false,
        }
    }
}

/// Drives periodic credential renewal and metrics updates.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use scp_exporter::auth::OidcAuthenticator;
/// use scp_exporter::metrics::MetricsUpdater;
/// use scp_exporter::refresher::{Refresher, DEFAULT_REFRESH_INTERVAL};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(updater: Arc<dyn MetricsUpdater>) {
/// let auth = Arc::new(OidcAuthenticator::new("refresh-token"));
/// let refresher = Refresher::new(auth, updater, DEFAULT_REFRESH_INTERVAL);
/// let outcome = refresher.run(CancellationToken::new()).await;
/// # let _ = outcome;
/// # }
/// ```
pub struct Refresher {
    authenticator: Arc<dyn Authenticator>,
    metrics_updater: Arc<dyn MetricsUpdater>,
    refresh_interval: Duration,
    expiry_buffer: Duration,
}

impl Refresher {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        metrics_updater: Arc<dyn MetricsUpdater>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            authenticator,
            metrics_updater,
            refresh_interval,
            expiry_buffer: AUTH_EXPIRY_BUFFER,
        }
    }

    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    /// One tick: renew the credential if it expires within the buffer, then
    /// update metrics. Metrics are skipped when renewal fails.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let buffer = chrono::Duration::from_std(self.expiry_buffer)
            .unwrap_or_else(|_| chrono::Duration::seconds(15));
        if self
            .authenticator
            .is_authentication_expired(Utc::now() + buffer)
        {
            debug!(
                expiry = ?self.authenticator.auth_data().snapshot().expiry,
                "access token near expiration, refreshing authentication"
            );
            self.authenticator.authenticate().await?;
        }
        self.metrics_updater.update_metrics().await?;
        debug!("metrics have been updated successfully");
        Ok(())
    }

    /// Tick immediately, then every interval, until `cancel` fires (returns
    /// `Ok`) or a tick fails with an authentication error (returns it).
    /// Cancellation aborts an in-flight tick.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RefreshError> {
        let mut ticker = tokio::time::interval(self.refresh_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.refresh_interval, "starting periodic metrics update");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.refresh() => outcome,
            };
            match outcome {
                Ok(()) => {}
                Err(RefreshError::Metric(e)) => {
                    warn!(error = %e, "metrics update error occurred during metrics refresh")
                }
                Err(e @ RefreshError::Auth(_)) => {
                    error!(error = %e, "authentication error occurred during metrics refresh, stopping");
                    return Err(e);
                }
            }
        }
        debug!("stopping updating metrics");
        Ok(())
    }
}
