//! HTTP endpoint exposing the metrics registry.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::ExporterError;

/// Upper bound for draining open connections after shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .with_state(registry)
}

/// Bind `addr` and return the bound address plus a future serving until
/// `shutdown` is cancelled and open connections drained (at most
/// [`SHUTDOWN_GRACE`]).
pub async fn run_server(
    registry: Registry,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(SocketAddr, impl Future<Output = Result<(), ExporterError>>), ExporterError> {
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = router(registry);

    let fut = async move {
        let signal = shutdown.clone();
        let graceful = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .into_future();
        tokio::select! {
            served = graceful => served.map_err(ExporterError::from),
            _ = async {
                shutdown.cancelled().await;
                tokio::time::sleep(SHUTDOWN_GRACE).await;
            } => {
                warn!("timed out draining http connections");
                Ok(())
            }
        }
    };
    Ok((addr, fut))
}

async fn handle_metrics(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buf) {
        error!(error = %e, "error encoding metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response()
}
