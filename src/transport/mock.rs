//! Scripted in-memory engine for driving the handler in tests.
//!
//! Every primitive call is recorded in order. Failures can be injected per
//! primitive. Connections are created with [`MockEngine::connect`]; the test
//! then plays the engine's role by invoking handler transitions directly.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use super::{ConnId, EndpointId, TcpEngine, TransportError, WriteFlags};

/// A primitive invocation observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    NewEndpoint(EndpointId),
    Bind(EndpointId, SocketAddr),
    Listen(EndpointId),
    AbortEndpoint(EndpointId),
    Attach(ConnId, u8),
    Detach(ConnId),
    Recved(ConnId, usize),
    Write(ConnId, Vec<u8>, WriteFlags),
    Output(ConnId),
    Close(ConnId),
    Abort(ConnId),
}

/// Injected failures. Each `Some` is returned by the matching primitive.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub new_endpoint: Option<TransportError>,
    pub bind: Option<TransportError>,
    pub listen: Option<TransportError>,
    pub write: Option<TransportError>,
    pub close: Option<TransportError>,
}

#[derive(Debug, Default)]
pub struct MockEngine {
    pub faults: Faults,
    calls: Vec<Call>,
    endpoints: HashMap<EndpointId, Option<SocketAddr>>,
    listening: HashSet<EndpointId>,
    live: HashSet<ConnId>,
    attached: HashMap<ConnId, u8>,
    sent: HashMap<ConnId, Vec<u8>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an inbound connection being established.
    pub fn connect(&mut self) -> ConnId {
        let conn = ConnId::next();
        self.live.insert(conn);
        conn
    }

    /// Simulate the engine invalidating a handle (reset, fatal error).
    pub fn invalidate(&mut self, conn: ConnId) {
        self.live.remove(&conn);
        self.attached.remove(&conn);
    }

    /// Every engine call made so far, oldest first.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// All bytes accepted by `write` for `conn`.
    pub fn sent_bytes(&self, conn: ConnId) -> &[u8] {
        self.sent.get(&conn).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_attached(&self, conn: ConnId) -> bool {
        self.attached.contains_key(&conn)
    }

    /// Interval passed to `attach`, while attached.
    pub fn poll_interval(&self, conn: ConnId) -> Option<u8> {
        self.attached.get(&conn).copied()
    }

    pub fn is_listening(&self, endpoint: EndpointId) -> bool {
        self.listening.contains(&endpoint)
    }
}

impl TcpEngine for MockEngine {
    fn new_endpoint(&mut self) -> Result<EndpointId, TransportError> {
        if let Some(err) = self.faults.new_endpoint.clone() {
            return Err(err);
        }
        let endpoint = EndpointId::next();
        self.endpoints.insert(endpoint, None);
        self.calls.push(Call::NewEndpoint(endpoint));
        Ok(endpoint)
    }

    fn bind(&mut self, endpoint: EndpointId, addr: SocketAddr) -> Result<(), TransportError> {
        self.calls.push(Call::Bind(endpoint, addr));
        if let Some(err) = self.faults.bind.clone() {
            return Err(err);
        }
        match self.endpoints.get_mut(&endpoint) {
            Some(slot) => {
                *slot = Some(addr);
                Ok(())
            }
            None => Err(TransportError::Value),
        }
    }

    fn listen(&mut self, endpoint: EndpointId) -> Result<EndpointId, TransportError> {
        self.calls.push(Call::Listen(endpoint));
        if let Some(err) = self.faults.listen.clone() {
            return Err(err);
        }
        match self.endpoints.get(&endpoint) {
            Some(Some(_)) => {
                self.listening.insert(endpoint);
                Ok(endpoint)
            }
            _ => Err(TransportError::Value),
        }
    }

    fn local_addr(&self, endpoint: EndpointId) -> Option<SocketAddr> {
        self.endpoints.get(&endpoint).copied().flatten()
    }

    fn abort_endpoint(&mut self, endpoint: EndpointId) {
        self.calls.push(Call::AbortEndpoint(endpoint));
        self.endpoints.remove(&endpoint);
        self.listening.remove(&endpoint);
    }

    fn is_live(&self, conn: ConnId) -> bool {
        self.live.contains(&conn)
    }

    fn attach(&mut self, conn: ConnId, poll_interval: u8) {
        self.calls.push(Call::Attach(conn, poll_interval));
        self.attached.insert(conn, poll_interval);
    }

    fn detach(&mut self, conn: ConnId) -> bool {
        self.calls.push(Call::Detach(conn));
        self.attached.remove(&conn).is_some()
    }

    fn recved(&mut self, conn: ConnId, len: usize) {
        self.calls.push(Call::Recved(conn, len));
    }

    fn write(&mut self, conn: ConnId, data: &[u8], flags: WriteFlags) -> Result<(), TransportError> {
        self.calls.push(Call::Write(conn, data.to_vec(), flags));
        if let Some(err) = self.faults.write.clone() {
            return Err(err);
        }
        if !self.live.contains(&conn) {
            return Err(TransportError::NotConnected);
        }
        self.sent.entry(conn).or_default().extend_from_slice(data);
        Ok(())
    }

    fn output(&mut self, conn: ConnId) -> Result<(), TransportError> {
        self.calls.push(Call::Output(conn));
        Ok(())
    }

    fn close(&mut self, conn: ConnId) -> Result<(), TransportError> {
        self.calls.push(Call::Close(conn));
        if let Some(err) = self.faults.close.clone() {
            return Err(err);
        }
        self.live.remove(&conn);
        Ok(())
    }

    fn abort(&mut self, conn: ConnId) {
        self.calls.push(Call::Abort(conn));
        self.live.remove(&conn);
        self.attached.remove(&conn);
    }
}
