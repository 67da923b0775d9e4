//! Single-task event loop bridging Tokio to the connection handler.
//!
//! Owns the [`HttpServer`] (and through it the engine and every session).
//! Socket tasks, the accept task and the tick timer all funnel into this one
//! loop, so handler transitions run strictly one at a time.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::httpd::{AcceptError, HttpServer};
use crate::net::engine::TokioEngine;
use crate::net::NetEvent;
use crate::transport::{ConnId, TcpEngine, TransportError};

/// Owns the server and applies every [`NetEvent`] and tick to it in order.
pub struct Reactor {
    server: HttpServer<TokioEngine>,
    events: mpsc::UnboundedReceiver<NetEvent>,
    tick: Duration,
}

impl Reactor {
    pub fn new(
        server: HttpServer<TokioEngine>,
        events: mpsc::UnboundedReceiver<NetEvent>,
        tick: Duration,
    ) -> Self {
        Self { server, events, tick }
    }

    /// Run until a shutdown signal arrives, then close everything.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => self.on_tick(),
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event),
                    None => break,
                },
            }
        }

        self.server.shutdown();
    }

    fn on_tick(&mut self) {
        let handler = self.server.handler_mut();
        for conn in handler.engine_mut().tick() {
            // An earlier idle check in this batch may have closed it.
            if handler.engine().is_attached(conn) {
                handler.on_idle(conn);
            }
        }
    }

    fn dispatch(&mut self, event: NetEvent) {
        let listening = self.server.listener();
        let handler = self.server.handler_mut();

        match event {
            NetEvent::Accepted { listener, result } => {
                if listening != Some(listener) {
                    return;
                }
                let accepted: Result<ConnId, TransportError> = result
                    .map(|(stream, peer)| handler.engine_mut().adopt(stream, peer))
                    .map_err(Into::into);
                let conn = accepted.as_ref().ok().copied();

                match handler.on_accept(accepted) {
                    Ok(()) | Err(AcceptError::OutOfMemory) => {}
                    Err(AcceptError::Value) => {
                        if let Some(conn) = conn {
                            handler.engine_mut().abort(conn);
                        }
                    }
                }
            }
            NetEvent::Received { conn, data } => {
                if handler.engine().is_attached(conn) {
                    handler.on_receive(conn, Ok(Some(data.as_slice())));
                }
            }
            NetEvent::PeerClosed { conn } => {
                if handler.engine().is_attached(conn) {
                    handler.on_receive(conn, Ok(None));
                }
            }
            NetEvent::Sent { conn, len } => {
                if handler.engine().is_attached(conn) {
                    handler.on_acknowledge(conn, len);
                }
            }
            NetEvent::Failed { conn, error } => {
                if handler.engine_mut().forget(conn) {
                    handler.on_error(conn, error);
                }
            }
        }
    }
}
