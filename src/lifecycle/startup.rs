//! Startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Metrics exporter first, listener last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::{validate_config, ServerConfig, ValidationError};
use crate::httpd::SetupError;
use crate::lifecycle::Shutdown;
use crate::net::{self, RunningServer};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0:?}")]
    Config(Vec<ValidationError>),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

/// Validate `config`, start the optional metrics exporter and the responder.
pub fn launch(config: &ServerConfig, shutdown: &Shutdown) -> Result<RunningServer, StartupError> {
    validate_config(config).map_err(StartupError::Config)?;

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr)?;
        }
    }

    let server = net::spawn(config, shutdown.subscribe())?;
    tracing::info!(address = %server.local_addr(), "hello-httpd ready");
    Ok(server)
}
