//! Opaque handles into an engine.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter shared by every handle kind.
/// Relaxed ordering is enough, handles only need to be unique.
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> u64 {
    HANDLE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Handle to an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl ConnId {
    /// Allocate a fresh, never reused connection handle.
    pub fn next() -> Self {
        Self(next_handle())
    }

    /// Get the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to a bound or listening endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Allocate a fresh endpoint handle.
    pub fn next() -> Self {
        Self(next_handle())
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ep-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = ConnId::next();
        let b = ConnId::next();
        assert_ne!(a, b);
        assert_ne!(EndpointId::next(), EndpointId::next());
    }

    #[test]
    fn conn_id_display() {
        let id = ConnId::next();
        assert_eq!(id.to_string(), format!("conn-{}", id.as_u64()));
    }
}
