//! Wires authenticator, collector, metrics, refresher and HTTP server.

use std::sync::Arc;

use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::{Authenticator, OidcAuthenticator};
use crate::collector::ScpServerCollector;
use crate::config::ExporterConfig;
use crate::error::ExporterError;
use crate::metrics::{ScpMetrics, ScpMetricsUpdater};
use crate::refresher::Refresher;
use crate::server::run_server;

/// Run the exporter until `shutdown` is cancelled or the refresh loop stops
/// on an authentication error.
pub async fn run(config: &ExporterConfig, shutdown: CancellationToken) -> Result<(), ExporterError> {
    let authenticator = Arc::new(OidcAuthenticator::new(config.refresh_token.clone()));

    if config.revoke_token {
        info!("revoking refresh token as requested");
        let revoked = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            revoked = authenticator.revoke() => revoked,
        };
        revoked.map_err(|e| {
            error!(error = %e, "error revoking refresh token");
            e
        })?;
        info!("successfully revoked refresh token, the application will now exit");
        return Ok(());
    }

    let result = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Ok(()),
        result = authenticator.authenticate() => result,
    };
    let result = result.map_err(|e| {
        error!(error = %e, "error during authentication");
        e
    })?;
    if result.is_new_device {
        let data = authenticator.auth_data().snapshot();
        warn!(
            refresh_token = %data.refresh_token,
            "first-time setup: obtained new refresh token, please store it for future use"
        );
        info!("the application will now exit, please restart it with the new refresh token");
        return Ok(());
    }

    if config.get_token_details {
        info!("getting token details as requested");
        let user = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(()),
            user = authenticator.user_info() => user,
        };
        let user = user.map_err(|e| {
            error!(error = %e, "error getting token details");
            e
        })?;
        info!(
            name = user.name.as_deref().unwrap_or(""),
            email = user.email.as_deref().unwrap_or(""),
            username = user.preferred_username.as_deref().unwrap_or(""),
            "token details obtained successfully"
        );
        return Ok(());
    }

    let registry = Registry::new();
    let metrics = ScpMetrics::new(&registry)?;
    let collector = Arc::new(ScpServerCollector::new(authenticator.auth_data()));
    let updater = Arc::new(ScpMetricsUpdater::new(collector, metrics));
    let refresher = Refresher::new(authenticator, updater, config.refresh_interval);

    let addr = config.listen_addr().await?;
    let (addr, server) = run_server(registry, addr, shutdown.clone()).await?;
    info!(address = %addr, "server is now accepting connections");

    let refresh_shutdown = shutdown.clone();
    let refresh_task = tokio::spawn(async move {
        let outcome = refresher.run(refresh_shutdown.clone()).await;
        // Take the server down with the loop so the process exits loudly.
        refresh_shutdown.cancel();
        outcome
    });

    let served = server.await;
    if let Err(e) = &served {
        error!(error = %e, "error listening and serving");
    }
    shutdown.cancel();

    refresh_task.await??;
    served
}
