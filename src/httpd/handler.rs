//! Connection state machine.
//!
//! # Responsibilities
//! - Own every live [`Session`], keyed by connection handle
//! - Drive accept → receive → send → drain → close for each connection
//! - Keep engine registrations and session ownership in lockstep
//!
//! # Design Decisions
//! - A session exists exactly while it is in the table; removal is the free
//! - `close` detaches before releasing the session, so a closed connection
//!   never sees another event
//! - Close failures degrade to abort and are never reported upward

use std::collections::HashMap;

use thiserror::Error;

use crate::httpd::response::{RESPONSE, RESPONSE_LEN};
use crate::httpd::session::Session;
use crate::observability::metrics::{self, CloseMode};
use crate::transport::{ConnId, TcpEngine, TransportError, WriteFlags};

/// Why an accepted connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcceptError {
    /// The accept event carried an error or an unusable handle.
    #[error("invalid connection handle or accept error")]
    Value,

    /// No room for another session; the connection was closed.
    #[error("out of memory for a new session")]
    OutOfMemory,
}

/// Per-connection state machine over a [`TcpEngine`].
pub struct ConnectionHandler<E> {
    engine: E,
    sessions: HashMap<ConnId, Session>,
    max_sessions: usize,
    poll_interval: u8,
}

impl<E: TcpEngine> ConnectionHandler<E> {
    /// Create a handler that admits at most `max_sessions` concurrent
    /// connections and asks for idle checks every `poll_interval` ticks.
    pub fn new(engine: E, max_sessions: usize, poll_interval: u8) -> Self {
        Self {
            engine,
            sessions: HashMap::new(),
            max_sessions,
            poll_interval,
        }
    }

    /// The engine this handler drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access for the adapter that feeds events in; the handler's
    /// session table is not touched.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Session of a live connection. `None` once the connection is closed,
    /// failed or was never admitted.
    pub fn session(&self, conn: ConnId) -> Option<&Session> {
        self.sessions.get(&conn)
    }

    /// Number of admitted connections that have not been released yet.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// A new inbound connection was established.
    pub fn on_accept(&mut self, accepted: Result<ConnId, TransportError>) -> Result<(), AcceptError> {
        let conn = match accepted {
            Ok(conn) if self.engine.is_live(conn) && !self.sessions.contains_key(&conn) => conn,
            Ok(conn) => {
                tracing::warn!(connection_id = %conn, "Rejecting unusable connection handle");
                metrics::record_reject("value");
                return Err(AcceptError::Value);
            }
            Err(err) => {
                tracing::warn!(error = %err, "Accept reported an error");
                metrics::record_reject("value");
                return Err(AcceptError::Value);
            }
        };

        if self.sessions.len() >= self.max_sessions {
            tracing::warn!(
                connection_id = %conn,
                max_sessions = self.max_sessions,
                "Session table full, closing connection"
            );
            metrics::record_reject("memory");
            self.shutdown_connection(conn);
            return Err(AcceptError::OutOfMemory);
        }

        self.sessions.insert(conn, Session::new());
        self.engine.attach(conn, self.poll_interval);

        metrics::record_accept();
        metrics::record_active_sessions(self.sessions.len());
        tracing::debug!(connection_id = %conn, "Connection accepted");
        Ok(())
    }

    /// Inbound data (`Ok(Some)`), peer half-close (`Ok(None)`) or a receive
    /// error.
    pub fn on_receive(&mut self, conn: ConnId, incoming: Result<Option<&[u8]>, TransportError>) {
        let data = match incoming {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(connection_id = %conn, "Peer closed");
                self.close(conn);
                return;
            }
            Err(err) => {
                tracing::debug!(connection_id = %conn, error = %err, "Receive failed");
                self.close(conn);
                return;
            }
        };

        // Request content is never inspected.
        self.engine.recved(conn, data.len());

        let Some(session) = self.sessions.get_mut(&conn) else {
            tracing::warn!(connection_id = %conn, "Data for connection without session");
            self.close(conn);
            return;
        };

        if !session.wants_response() {
            tracing::trace!(
                connection_id = %conn,
                len = data.len(),
                state = ?session.state(),
                "Ignoring data, response in flight"
            );
            return;
        }

        session.mark_queued(RESPONSE_LEN);
        if let Err(err) = self.engine.write(conn, RESPONSE, WriteFlags::COPY) {
            tracing::warn!(connection_id = %conn, error = %err, "Response write failed");
            session.abandon();
            self.close(conn);
            return;
        }

        if let Err(err) = self.engine.output(conn) {
            // Queued data still goes out on the engine's next pass.
            tracing::debug!(connection_id = %conn, error = %err, "Output flush deferred");
        }

        metrics::record_response();
        tracing::debug!(connection_id = %conn, len = RESPONSE_LEN, "Response queued");
    }

    /// The peer acknowledged `len` bytes.
    pub fn on_acknowledge(&mut self, conn: ConnId, len: usize) {
        let Some(session) = self.sessions.get_mut(&conn) else {
            return;
        };

        let remaining = session.acknowledge(len);
        tracing::trace!(connection_id = %conn, acked = len, remaining, "Acknowledged");

        if remaining == 0 {
            tracing::debug!(connection_id = %conn, "Response delivered");
            self.close(conn);
        }
    }

    /// Periodic idle check.
    pub fn on_idle(&mut self, conn: ConnId) {
        match self.sessions.get(&conn).map(Session::is_drained) {
            None => {
                tracing::debug!(connection_id = %conn, "Idle connection without session");
                self.close(conn);
            }
            Some(true) => {
                tracing::debug!(connection_id = %conn, "Closing drained connection on idle check");
                self.close(conn);
            }
            Some(false) => {}
        }
    }

    /// Fatal transport error. The handle is already invalid.
    pub fn on_error(&mut self, conn: ConnId, err: TransportError) {
        let state = self.sessions.remove(&conn).map(|session| session.state());
        if state.is_some() {
            metrics::record_close(CloseMode::Error);
            metrics::record_active_sessions(self.sessions.len());
        }
        tracing::debug!(connection_id = %conn, error = %err, state = ?state, "Connection failed");
    }

    /// Tear down `conn`. Safe to call any number of times.
    pub fn close(&mut self, conn: ConnId) {
        let was_attached = self.engine.detach(conn);
        let session = self.sessions.remove(&conn);

        if !was_attached && session.is_none() {
            tracing::trace!(connection_id = %conn, "Already closed");
            return;
        }

        metrics::record_active_sessions(self.sessions.len());
        self.shutdown_connection(conn);
    }

    /// Close every live connection.
    pub fn close_all(&mut self) {
        let conns: Vec<ConnId> = self.sessions.keys().copied().collect();
        for conn in conns {
            self.close(conn);
        }
    }

    /// Graceful close, falling back to abort.
    fn shutdown_connection(&mut self, conn: ConnId) {
        match self.engine.close(conn) {
            Ok(()) => {
                metrics::record_close(CloseMode::Graceful);
                tracing::debug!(connection_id = %conn, "Connection closed");
            }
            Err(err) => {
                tracing::warn!(connection_id = %conn, error = %err, "Close failed, aborting");
                self.engine.abort(conn);
                metrics::record_close(CloseMode::Abort);
            }
        }
    }
}
