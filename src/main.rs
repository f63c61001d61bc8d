//! scp-exporter binary entry point.

use scp_exporter::config::ExporterConfig;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = ExporterConfig::load();
    if let Err(e) = scp_exporter::logging::init(&config.log) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                signal.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupt signal"),
        }
    });

    if let Err(e) = scp_exporter::app::run(&config, shutdown).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
