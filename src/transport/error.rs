//! Engine error codes.

use thiserror::Error;

/// Errors reported by a [`TcpEngine`](super::TcpEngine) primitive or carried
/// by an engine event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Out of memory (buffers, control blocks).
    #[error("out of memory")]
    Memory,

    /// Send queue or buffer space exhausted.
    #[error("buffer error")]
    Buffer,

    /// Illegal value or invalid handle.
    #[error("illegal value")]
    Value,

    /// Address already in use.
    #[error("address in use")]
    InUse,

    /// Operation requires a connected endpoint.
    #[error("not connected")]
    NotConnected,

    /// Connection aborted locally.
    #[error("connection aborted")]
    Aborted,

    /// Connection reset by the peer.
    #[error("connection reset")]
    Reset,

    /// Connection already closed.
    #[error("connection closed")]
    Closed,

    /// Any other I/O failure surfaced by the host networking layer.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::OutOfMemory => TransportError::Memory,
            ErrorKind::WouldBlock | ErrorKind::WriteZero => TransportError::Buffer,
            ErrorKind::InvalidInput => TransportError::Value,
            ErrorKind::AddrInUse => TransportError::InUse,
            ErrorKind::NotConnected => TransportError::NotConnected,
            ErrorKind::ConnectionAborted => TransportError::Aborted,
            ErrorKind::ConnectionReset => TransportError::Reset,
            ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_kinds_map_to_engine_codes() {
        let reset: TransportError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert_eq!(reset, TransportError::Reset);

        let in_use: TransportError = io::Error::from(io::ErrorKind::AddrInUse).into();
        assert_eq!(in_use, TransportError::InUse);

        let other: TransportError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(other, TransportError::Io(msg) if msg.contains("boom")));
    }
}
