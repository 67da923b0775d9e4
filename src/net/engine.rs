//! [`TcpEngine`] over Tokio sockets.
//!
//! The engine itself never awaits. Binding uses a blocking std listener that
//! is handed to Tokio on `listen`; per-connection I/O runs in the tasks of
//! [`ConnectionIo`] and reports back through the reactor's event channel.
//!
//! "Acknowledged" for this engine means written and flushed to the kernel.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::net::connection::ConnectionIo;
use crate::net::NetEvent;
use crate::transport::{ConnId, EndpointId, TcpEngine, TransportError, WriteFlags};

/// Per-connection limit on bytes queued but not yet handed to the writer.
const SEND_BUFFER: usize = 8 * 1024;

/// First pause after a failed accept; doubles per consecutive failure.
const ACCEPT_BACKOFF_BASE_MS: u64 = 10;

/// Upper bound on the pause between failed accepts.
const ACCEPT_BACKOFF_MAX_MS: u64 = 1_000;

enum Endpoint {
    Unbound,
    Bound(std::net::TcpListener),
    Listening { addr: SocketAddr, task: JoinHandle<()> },
}

#[derive(Debug, Clone, Copy)]
struct PollTimer {
    interval: u8,
    elapsed: u8,
}

struct Connection {
    io: ConnectionIo,
    /// `Some` while attached.
    poll: Option<PollTimer>,
    pending: Vec<u8>,
}

/// [`TcpEngine`] backed by tokio sockets.
///
/// Socket activity is reported through the events channel handed to
/// [`TokioEngine::new`]; the reactor owning the receiving end decides which
/// events reach the handler.
pub struct TokioEngine {
    events: mpsc::UnboundedSender<NetEvent>,
    endpoints: HashMap<EndpointId, Endpoint>,
    conns: HashMap<ConnId, Connection>,
}

impl TokioEngine {
    /// Create an engine with no endpoints or connections.
    pub fn new(events: mpsc::UnboundedSender<NetEvent>) -> Self {
        Self {
            events,
            endpoints: HashMap::new(),
            conns: HashMap::new(),
        }
    }

    /// Take ownership of a freshly accepted stream.
    pub fn adopt(&mut self, stream: TcpStream, peer: SocketAddr) -> ConnId {
        let conn = ConnId::next();
        let io = ConnectionIo::spawn(conn, stream, self.events.clone());
        self.conns.insert(
            conn,
            Connection {
                io,
                poll: None,
                pending: Vec::new(),
            },
        );
        tracing::debug!(connection_id = %conn, peer_addr = %peer, "Stream adopted");
        conn
    }

    /// Whether events for `conn` should reach the handler.
    pub fn is_attached(&self, conn: ConnId) -> bool {
        self.conns.get(&conn).is_some_and(|c| c.poll.is_some())
    }

    /// Drop a connection whose socket failed.
    ///
    /// Returns `true` if it was attached, i.e. the handler must hear about it.
    pub fn forget(&mut self, conn: ConnId) -> bool {
        match self.conns.remove(&conn) {
            Some(connection) => {
                let attached = connection.poll.is_some();
                connection.io.abort();
                attached
            }
            None => false,
        }
    }

    /// Advance every attached connection's poll timer by one tick.
    ///
    /// Returns the connections whose idle check is due.
    pub fn tick(&mut self) -> Vec<ConnId> {
        let mut due = Vec::new();
        for (conn, connection) in self.conns.iter_mut() {
            if let Some(timer) = connection.poll.as_mut() {
                timer.elapsed = timer.elapsed.saturating_add(1);
                if timer.elapsed >= timer.interval {
                    timer.elapsed = 0;
                    due.push(*conn);
                }
            }
        }
        due
    }

    fn flush(connection: &mut Connection) -> Result<(), TransportError> {
        if connection.pending.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut connection.pending);
        connection.io.send(data)
    }
}

/// Delay before the next accept after `failures` consecutive errors.
fn accept_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(failures - 1);
    let delay_ms = ACCEPT_BACKOFF_BASE_MS.saturating_mul(exponential_base);
    Duration::from_millis(delay_ms.min(ACCEPT_BACKOFF_MAX_MS))
}

/// Forward accepted streams (and accept errors) to the reactor.
///
/// Errors such as descriptor exhaustion tend to repeat immediately, so each
/// consecutive failure waits longer before retrying. Only the first error of
/// a streak is logged at `warn`.
async fn accept_loop<F, Fut>(
    endpoint: EndpointId,
    events: mpsc::UnboundedSender<NetEvent>,
    mut accept: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<(TcpStream, SocketAddr)>>,
{
    let mut failures: u32 = 0;
    loop {
        let result = accept().await;

        let delay = match &result {
            Ok(_) => {
                failures = 0;
                Duration::ZERO
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures);
                if failures == 1 {
                    tracing::warn!(endpoint = %endpoint, error = %err, "Accept failed, backing off");
                } else {
                    tracing::debug!(endpoint = %endpoint, error = %err, failures, delay = ?delay, "Accept still failing");
                }
                delay
            }
        };

        if events.send(NetEvent::Accepted { listener: endpoint, result }).is_err() {
            break;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl TcpEngine for TokioEngine {
    fn new_endpoint(&mut self) -> Result<EndpointId, TransportError> {
        let endpoint = EndpointId::next();
        self.endpoints.insert(endpoint, Endpoint::Unbound);
        Ok(endpoint)
    }

    fn bind(&mut self, endpoint: EndpointId, addr: SocketAddr) -> Result<(), TransportError> {
        let slot = self.endpoints.get_mut(&endpoint).ok_or(TransportError::Value)?;
        if !matches!(slot, Endpoint::Unbound) {
            return Err(TransportError::Value);
        }
        let listener = std::net::TcpListener::bind(addr)?;
        *slot = Endpoint::Bound(listener);
        Ok(())
    }

    fn listen(&mut self, endpoint: EndpointId) -> Result<EndpointId, TransportError> {
        let std_listener = match self.endpoints.remove(&endpoint) {
            Some(Endpoint::Bound(listener)) => listener,
            Some(other) => {
                self.endpoints.insert(endpoint, other);
                return Err(TransportError::Value);
            }
            None => return Err(TransportError::Value),
        };

        std_listener.set_nonblocking(true)?;
        let addr = std_listener.local_addr()?;
        let listener = tokio::net::TcpListener::from_std(std_listener)?;

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let listener = &listener;
            accept_loop(endpoint, events, move || listener.accept()).await;
        });

        self.endpoints.insert(endpoint, Endpoint::Listening { addr, task });
        Ok(endpoint)
    }

    fn local_addr(&self, endpoint: EndpointId) -> Option<SocketAddr> {
        match self.endpoints.get(&endpoint)? {
            Endpoint::Unbound => None,
            Endpoint::Bound(listener) => listener.local_addr().ok(),
            Endpoint::Listening { addr, .. } => Some(*addr),
        }
    }

    fn abort_endpoint(&mut self, endpoint: EndpointId) {
        if let Some(Endpoint::Listening { task, .. }) = self.endpoints.remove(&endpoint) {
            task.abort();
        }
    }

    fn is_live(&self, conn: ConnId) -> bool {
        self.conns.contains_key(&conn)
    }

    fn attach(&mut self, conn: ConnId, poll_interval: u8) {
        if let Some(connection) = self.conns.get_mut(&conn) {
            connection.poll = Some(PollTimer {
                interval: poll_interval.max(1),
                elapsed: 0,
            });
        }
    }

    fn detach(&mut self, conn: ConnId) -> bool {
        self.conns
            .get_mut(&conn)
            .and_then(|connection| connection.poll.take())
            .is_some()
    }

    fn recved(&mut self, conn: ConnId, len: usize) {
        // The kernel owns the receive window; nothing to reopen here.
        tracing::trace!(connection_id = %conn, len, "Received bytes consumed");
    }

    fn write(&mut self, conn: ConnId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError> {
        let connection = self.conns.get_mut(&conn).ok_or(TransportError::NotConnected)?;
        if connection.pending.len() + data.len() > SEND_BUFFER {
            return Err(TransportError::Memory);
        }
        // Always copied: the writer task outlives the caller's buffer.
        connection.pending.extend_from_slice(data);
        tracing::trace!(
            connection_id = %conn,
            queued = connection.pending.len(),
            copy = flags.copy,
            "Write queued"
        );
        Ok(())
    }

    fn output(&mut self, conn: ConnId) -> Result<(), TransportError> {
        let connection = self.conns.get_mut(&conn).ok_or(TransportError::NotConnected)?;
        Self::flush(connection)
    }

    fn close(&mut self, conn: ConnId) -> Result<(), TransportError> {
        let connection = self.conns.get_mut(&conn).ok_or(TransportError::NotConnected)?;
        Self::flush(connection)?;
        connection.io.close()?;
        // The writer finishes the shutdown on its own.
        self.conns.remove(&conn);
        Ok(())
    }

    fn abort(&mut self, conn: ConnId) {
        if let Some(connection) = self.conns.remove(&conn) {
            connection.io.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn accept_backoff_grows_and_caps() {
        assert_eq!(accept_backoff(0), Duration::ZERO);
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(5), Duration::from_millis(160));
        assert_eq!(accept_backoff(40), Duration::from_millis(ACCEPT_BACKOFF_MAX_MS));
    }

    #[tokio::test]
    async fn persistent_accept_errors_are_throttled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        // EMFILE on every attempt, as under descriptor exhaustion.
        let task = tokio::spawn(accept_loop(EndpointId::next(), tx, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(TcpStream, SocketAddr), _>(io::Error::from_raw_os_error(24)) }
        }));

        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        let mut errors = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, NetEvent::Accepted { result: Err(_), .. }));
            errors += 1;
        }
        assert!(errors >= 1);
        assert!(errors < 10, "accept retried {} times in 200ms", errors);
        assert!(attempts.load(Ordering::SeqCst) < 10);
    }

    #[tokio::test]
    async fn accept_loop_stops_when_reactor_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let finished = tokio::time::timeout(
            Duration::from_secs(1),
            accept_loop(EndpointId::next(), tx, || async {
                Err::<(TcpStream, SocketAddr), _>(io::Error::from(io::ErrorKind::ConnectionAborted))
            }),
        )
        .await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn forget_reports_attachment_and_drops_connection() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = TokioEngine::new(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let attached = engine.adopt(stream, peer);
        engine.attach(attached, 4);
        assert!(engine.is_attached(attached));
        assert!(engine.forget(attached));
        assert!(!engine.is_live(attached));
        assert!(!engine.forget(attached));
    }

    #[tokio::test]
    async fn tick_reports_due_idle_checks() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = TokioEngine::new(tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = listener.accept().await.unwrap();

        let conn = engine.adopt(stream, peer);
        engine.attach(conn, 2);
        assert!(engine.tick().is_empty());
        assert_eq!(engine.tick(), vec![conn]);

        assert!(engine.detach(conn));
        assert!(engine.tick().is_empty());
    }
}
