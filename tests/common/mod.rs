//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use hello_httpd::config::ServerConfig;
use hello_httpd::lifecycle::{self, Shutdown};
use hello_httpd::net::RunningServer;

pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback config on an ephemeral port with a fast engine tick.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.tick_ms = 20;
    config
}

/// Start a responder on the current runtime.
pub fn start_server(config: ServerConfig) -> (RunningServer, Shutdown) {
    let shutdown = Shutdown::new();
    let server = lifecycle::launch(&config, &shutdown).expect("server should start");
    (server, shutdown)
}

/// Read until the server closes the connection.
pub async fn read_until_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut reply = Vec::new();
    tokio::time::timeout(IO_TIMEOUT, stream.read_to_end(&mut reply))
        .await
        .expect("server should close the connection")
        .expect("read should succeed");
    reply
}

/// Connect, send `request`, and collect everything until close.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    read_until_close(&mut stream).await
}
