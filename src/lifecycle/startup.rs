//! Startup orchestration.
//!
//! Order: metrics exporter, HTTP pipeline, listener. Any failure before the
//! listener is bound is fatal.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::{self, MetricsError};

/// Error type for service startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

fn parse_addr(address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|source| StartupError::Address {
        address: address.to_string(),
        source,
    })
}

/// Bring the service up and serve until shutdown.
pub async fn run(config: ServiceConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        metrics::init_metrics(parse_addr(&config.observability.metrics_address)?)?;
    }

    let server = HttpServer::new(config)?;

    let address = parse_addr(&server.config().listener.bind_address)?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    server
        .run(listener, shutdown.subscribe())
        .await
        .map_err(StartupError::Serve)
}
