//! Per-connection session record.

/// Derived lifecycle state of a live session.
///
/// `Closed` has no variant: a closed session no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, nothing queued yet.
    Idle,
    /// Response queued, possibly still in flight.
    ResponseSent,
}

/// Response-transmission progress for one connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    /// Response bytes not yet acknowledged by the peer.
    remaining: usize,
    /// Set once the response has been queued.
    response_sent: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response bytes queued but not yet acknowledged.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Set once, when the response is first queued.
    pub fn response_sent(&self) -> bool {
        self.response_sent
    }

    /// Lifecycle state derived from `response_sent`.
    pub fn state(&self) -> SessionState {
        if self.response_sent {
            SessionState::ResponseSent
        } else {
            SessionState::Idle
        }
    }

    /// Whether a response should be queued now.
    pub fn wants_response(&self) -> bool {
        self.remaining == 0 && !self.response_sent
    }

    /// Record that `len` response bytes were queued.
    pub fn mark_queued(&mut self, len: usize) {
        self.remaining = len;
        self.response_sent = true;
    }

    /// Drop any outstanding count after a failed write.
    pub fn abandon(&mut self) {
        self.remaining = 0;
    }

    /// Apply a peer acknowledgement of `len` bytes, clamped at zero.
    ///
    /// Returns the new outstanding count.
    pub fn acknowledge(&mut self, len: usize) -> usize {
        self.remaining = self.remaining.saturating_sub(len);
        self.remaining
    }

    /// Response fully delivered; safe to tear down.
    pub fn is_drained(&self) -> bool {
        self.response_sent && self.remaining == 0
    }
}
