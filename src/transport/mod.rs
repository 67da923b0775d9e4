//! Raw TCP engine contract.
//!
//! # Data Flow
//! ```text
//! Engine detects socket activity
//!     → adapter (net::reactor, or a test driver) invokes a handler transition
//!     → handler calls back into the engine primitives below
//!         (recved, write, output, close, abort, attach/detach)
//! ```
//!
//! # Design Decisions
//! - Primitives are synchronous and never block; the engine queues work
//! - Events are only delivered for attached connections; `detach` is the
//!   single point after which a connection is invisible to the handler
//! - Handles are plain copyable ids, ownership of per-connection state lives
//!   with the handler, not with the engine

pub mod error;
pub mod handle;
pub mod mock;

use std::net::SocketAddr;

pub use error::TransportError;
pub use handle::{ConnId, EndpointId};

/// Flags accepted by [`TcpEngine::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteFlags {
    /// The engine takes its own copy of the data before returning.
    pub copy: bool,
}

impl WriteFlags {
    /// Copy the caller's buffer; it need not outlive the call.
    pub const COPY: WriteFlags = WriteFlags { copy: true };
}

/// Primitives a callback-driven TCP engine offers to the application.
pub trait TcpEngine {
    /// Allocate a fresh, unbound endpoint.
    fn new_endpoint(&mut self) -> Result<EndpointId, TransportError>;

    /// Bind an endpoint to a local address.
    fn bind(&mut self, endpoint: EndpointId, addr: SocketAddr) -> Result<(), TransportError>;

    /// Move a bound endpoint into listening state and arm accept events.
    ///
    /// Returns the handle of the listening endpoint, which may differ from
    /// the one passed in.
    fn listen(&mut self, endpoint: EndpointId) -> Result<EndpointId, TransportError>;

    /// Local address of a bound or listening endpoint.
    fn local_addr(&self, endpoint: EndpointId) -> Option<SocketAddr>;

    /// Release an endpoint without any orderly shutdown.
    fn abort_endpoint(&mut self, endpoint: EndpointId);

    /// Whether `conn` refers to a connection the engine still owns.
    fn is_live(&self, conn: ConnId) -> bool;

    /// Register the connection for receive, sent, error and poll events.
    /// Poll events fire every `poll_interval` engine ticks.
    fn attach(&mut self, conn: ConnId, poll_interval: u8);

    /// Clear every event registration for `conn`.
    ///
    /// Returns `true` if the connection was attached.
    fn detach(&mut self, conn: ConnId) -> bool;

    /// Tell the engine the application consumed `len` received bytes.
    fn recved(&mut self, conn: ConnId, len: usize);

    /// Queue data for transmission.
    fn write(&mut self, conn: ConnId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError>;

    /// Push queued data out now.
    fn output(&mut self, conn: ConnId) -> Result<(), TransportError>;

    /// Orderly close. On error the connection is still owned by the caller.
    fn close(&mut self, conn: ConnId) -> Result<(), TransportError>;

    /// Immediate teardown. Never fails; the handle is invalid afterwards.
    fn abort(&mut self, conn: ConnId);
}
