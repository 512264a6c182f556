//! Prometheus metrics endpoint.
//!
//! Serves `/metrics` in Prometheus text format and `/health` for liveness
//! checks while a load is running.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Install the Prometheus recorder and start the HTTP endpoint.
///
/// The caller owns the returned task and aborts it once the load finishes.
pub fn init(addr: SocketAddr) -> Result<JoinHandle<()>, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    debug!("Metrics endpoint listening on http://{addr}/metrics");
    Ok(tokio::spawn(run_server(addr, handle)))
}

fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle))
}

async fn run_server(addr: SocketAddr, handle: PrometheusHandle) {
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {addr}: {e}");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, router(handle)).await {
        error!("Metrics server error: {e}");
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
