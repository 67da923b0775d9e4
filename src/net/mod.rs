//! Network layer: the Tokio-backed engine.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → engine.rs (accept task → NetEvent::Accepted)
//!     → reactor.rs (adopt stream, handler.on_accept)
//!     → connection.rs (reader/writer tasks → Received/PeerClosed/Sent/Failed)
//!     → reactor.rs (handler transitions, one at a time)
//! ```
//!
//! # Design Decisions
//! - All handler state lives in the reactor task; socket tasks only talk
//!   to it through an unbounded channel
//! - Events for detached connections are dropped in the reactor

pub mod connection;
pub mod engine;
pub mod reactor;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::httpd::{HttpServer, SetupError};
use crate::transport::{ConnId, EndpointId, TransportError};

pub use engine::TokioEngine;
pub use reactor::Reactor;

/// Socket activity reported to the reactor.
#[derive(Debug)]
pub enum NetEvent {
    Accepted {
        listener: EndpointId,
        result: std::io::Result<(TcpStream, SocketAddr)>,
    },
    Received { conn: ConnId, data: Vec<u8> },
    PeerClosed { conn: ConnId },
    Sent { conn: ConnId, len: usize },
    Failed { conn: ConnId, error: TransportError },
}

/// A responder running on the current Tokio runtime.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// Address the listener actually bound, with any port 0 resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the reactor to exit after shutdown was triggered.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Bind the listener and start the reactor.
///
/// Must be called from within a Tokio runtime.
pub fn spawn(
    config: &ServerConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<RunningServer, SetupError> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let server = HttpServer::init(TokioEngine::new(events_tx), config)?;
    let local_addr = server
        .local_addr()
        .ok_or(SetupError::Listen(TransportError::NotConnected))?;

    let reactor = Reactor::new(
        server,
        events_rx,
        Duration::from_millis(config.timeouts.tick_ms),
    );
    let task = tokio::spawn(reactor.run(shutdown));

    Ok(RunningServer { local_addr, task })
}
