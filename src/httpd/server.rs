//! Listening endpoint setup and teardown.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ServerConfig;
use crate::httpd::handler::ConnectionHandler;
use crate::transport::{EndpointId, TcpEngine, TransportError};

/// Failure to bring the listening endpoint up.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid bind address {addr:?}: {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to create endpoint: {0}")]
    Create(#[source] TransportError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: TransportError,
    },

    #[error("failed to listen: {0}")]
    Listen(#[source] TransportError),
}

/// An initialised responder: one listening endpoint plus the handler that
/// owns every accepted connection.
pub struct HttpServer<E> {
    handler: ConnectionHandler<E>,
    listener: Option<EndpointId>,
}

impl<E: TcpEngine> HttpServer<E> {
    /// Create, bind and listen. Any failure aborts the endpoint, so nothing
    /// is left listening.
    pub fn init(mut engine: E, config: &ServerConfig) -> Result<Self, SetupError> {
        let addr: SocketAddr = config
            .listener
            .bind_address
            .parse()
            .map_err(|source| SetupError::Address {
                addr: config.listener.bind_address.clone(),
                source,
            })?;

        let endpoint = engine.new_endpoint().map_err(|err| {
            tracing::warn!(error = %err, "Endpoint creation failed");
            SetupError::Create(err)
        })?;

        if let Err(source) = engine.bind(endpoint, addr) {
            tracing::warn!(address = %addr, error = %source, "Bind failed");
            engine.abort_endpoint(endpoint);
            return Err(SetupError::Bind { addr, source });
        }

        let listener = match engine.listen(endpoint) {
            Ok(listener) => listener,
            Err(err) => {
                tracing::warn!(address = %addr, error = %err, "Listen failed");
                engine.abort_endpoint(endpoint);
                return Err(SetupError::Listen(err));
            }
        };

        tracing::info!(
            address = %engine.local_addr(listener).unwrap_or(addr),
            max_sessions = config.listener.max_sessions,
            poll_interval_ticks = config.timeouts.poll_interval_ticks,
            "Listening"
        );

        Ok(Self {
            handler: ConnectionHandler::new(
                engine,
                config.listener.max_sessions,
                config.timeouts.poll_interval_ticks,
            ),
            listener: Some(listener),
        })
    }

    pub fn handler(&self) -> &ConnectionHandler<E> {
        &self.handler
    }

    /// Handler the event adapter drives transitions through.
    pub fn handler_mut(&mut self) -> &mut ConnectionHandler<E> {
        &mut self.handler
    }

    pub fn listener(&self) -> Option<EndpointId> {
        self.listener
    }

    /// `false` after [`HttpServer::shutdown`].
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Address the listening endpoint is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .and_then(|listener| self.handler.engine().local_addr(listener))
    }

    /// Stop accepting and close every live connection.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.handler.engine_mut().abort_endpoint(listener);
        }
        let live = self.handler.active_sessions();
        self.handler.close_all();
        tracing::info!(closed = live, "Responder shut down");
    }
}
