//! Per-connection socket tasks.
//!
//! # Responsibilities
//! - Split an accepted stream into a reader and a writer task
//! - Forward socket activity to the reactor as [`NetEvent`]s
//! - Execute write, close and abort requests issued by the engine
//!
//! Neither task touches handler state; everything they observe goes through
//! the event channel so transitions stay serialised in the reactor.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::net::NetEvent;
use crate::transport::{ConnId, TransportError};

/// Size of the buffer each read lands in.
const READ_BUFFER: usize = 1460;

/// Requests from the engine to a writer task.
#[derive(Debug)]
enum WriterCommand {
    Write(Vec<u8>),
    Close,
}

/// Handles to the two tasks serving one connection.
#[derive(Debug)]
pub struct ConnectionIo {
    commands: mpsc::UnboundedSender<WriterCommand>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ConnectionIo {
    /// Start the reader and writer tasks for `stream`.
    pub fn spawn(
        conn: ConnId,
        stream: TcpStream,
        events: mpsc::UnboundedSender<NetEvent>,
    ) -> Self {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(connection_id = %conn, error = %err, "Failed to set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        // Dropped by the writer when it exits, which stops the reader.
        let (stop_tx, stop_rx) = oneshot::channel();

        let reader = tokio::spawn(read_loop(conn, read_half, events.clone(), stop_rx));
        let writer = tokio::spawn(write_loop(conn, write_half, commands_rx, events, stop_tx));

        Self {
            commands: commands_tx,
            reader,
            writer,
        }
    }

    /// Queue bytes on the writer.
    pub fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.commands
            .send(WriterCommand::Write(data))
            .map_err(|_| TransportError::Closed)
    }

    /// Ask the writer to shut down the write half once queued data is out.
    pub fn close(&self) -> Result<(), TransportError> {
        self.commands
            .send(WriterCommand::Close)
            .map_err(|_| TransportError::Closed)
    }

    /// Kill both tasks; the socket is dropped without flushing.
    pub fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn read_loop(
    conn: ConnId,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<NetEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        tokio::select! {
            _ = &mut stop => break,
            read = reader.read(&mut buf) => {
                let event = match read {
                    Ok(0) => NetEvent::PeerClosed { conn },
                    Ok(n) => NetEvent::Received { conn, data: buf[..n].to_vec() },
                    Err(err) => NetEvent::Failed { conn, error: err.into() },
                };
                let last = !matches!(event, NetEvent::Received { .. });
                if events.send(event).is_err() || last {
                    break;
                }
            }
        }
    }
    tracing::trace!(connection_id = %conn, "Reader finished");
}

async fn write_loop(
    conn: ConnId,
    mut writer: OwnedWriteHalf,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    events: mpsc::UnboundedSender<NetEvent>,
    _stop: oneshot::Sender<()>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Write(data) => {
                let result = async {
                    writer.write_all(&data).await?;
                    writer.flush().await
                }
                .await;

                let event = match result {
                    Ok(()) => NetEvent::Sent { conn, len: data.len() },
                    Err(err) => NetEvent::Failed { conn, error: err.into() },
                };
                let failed = matches!(event, NetEvent::Failed { .. });
                if events.send(event).is_err() || failed {
                    break;
                }
            }
            WriterCommand::Close => {
                if let Err(err) = writer.shutdown().await {
                    tracing::debug!(connection_id = %conn, error = %err, "Shutdown failed");
                }
                break;
            }
        }
    }
    tracing::trace!(connection_id = %conn, "Writer finished");
}
