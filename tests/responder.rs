//! End-to-end behaviour of the responder over real sockets.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use hello_httpd::httpd::RESPONSE;

mod common;

#[tokio::test]
async fn get_request_receives_exact_response() {
    let (server, shutdown) = common::start_server(common::test_config());

    let reply = common::exchange(server.local_addr(), b"GET / HTTP/1.1\r\n\r\n").await;

    assert_eq!(reply, RESPONSE);
    shutdown.trigger();
}

#[tokio::test]
async fn request_content_is_ignored() {
    let (server, shutdown) = common::start_server(common::test_config());

    let reply = common::exchange(server.local_addr(), b"\x00\x01not http at all").await;
    assert_eq!(reply, RESPONSE);

    let reply = common::exchange(server.local_addr(), b"POST /submit HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc").await;
    assert_eq!(reply, RESPONSE);

    shutdown.trigger();
}

#[tokio::test]
async fn half_close_without_data_gets_no_response() {
    let (server, shutdown) = common::start_server(common::test_config());

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.shutdown().await.unwrap();

    let reply = common::read_until_close(&mut stream).await;
    assert!(reply.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn response_sent_once_despite_extra_data() {
    let (server, shutdown) = common::start_server(common::test_config());

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    // The pipelined second request is not answered.
    stream
        .write_all(b"GET / HTTP/1.1\r\n\r\nGET /again HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let reply = common::read_until_close(&mut stream).await;
    assert_eq!(reply, RESPONSE);

    shutdown.trigger();
}

#[tokio::test]
async fn idle_connection_survives_poll_ticks() {
    let (server, shutdown) = common::start_server(common::test_config());

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    // Several poll intervals at a 20ms tick.
    tokio::time::sleep(Duration::from_millis(300)).await;
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

    let reply = common::read_until_close(&mut stream).await;
    assert_eq!(reply, RESPONSE);

    shutdown.trigger();
}

#[tokio::test]
async fn concurrent_clients_each_get_one_response() {
    let (server, shutdown) = common::start_server(common::test_config());
    let addr = server.local_addr();

    let mut tasks = Vec::new();
    for i in 0..16 {
        tasks.push(tokio::spawn(async move {
            let request = format!("GET /{} HTTP/1.1\r\n\r\n", i);
            common::exchange(addr, request.as_bytes()).await
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), RESPONSE);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn full_session_table_closes_new_connections() {
    let mut config = common::test_config();
    config.listener.max_sessions = 1;
    let (server, shutdown) = common::start_server(config);

    let mut holder = TcpStream::connect(server.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rejected = TcpStream::connect(server.local_addr()).await.unwrap();
    let reply = common::read_until_close(&mut rejected).await;
    assert!(reply.is_empty());

    // The admitted connection is still served.
    holder.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    assert_eq!(common::read_until_close(&mut holder).await, RESPONSE);

    shutdown.trigger();
}

/// Drop `stream` with SO_LINGER 0 so the server sees a reset instead of FIN.
fn reset(stream: TcpStream) {
    #[allow(deprecated)]
    stream.set_linger(Some(Duration::ZERO)).unwrap();
    drop(stream);
}

#[tokio::test]
async fn reset_connection_frees_its_session() {
    let mut config = common::test_config();
    config.listener.max_sessions = 1;
    let (server, shutdown) = common::start_server(config);

    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    reset(stream);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The only slot is free again.
    let reply = common::exchange(server.local_addr(), b"GET / HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply, RESPONSE);

    shutdown.trigger();
}

#[tokio::test]
async fn reset_after_request_does_not_wedge_server() {
    let mut config = common::test_config();
    config.listener.max_sessions = 1;
    let (server, shutdown) = common::start_server(config);

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    reset(stream);
    tokio::time::sleep(Duration::from_millis(100)).await;

    for _ in 0..2 {
        let reply = common::exchange(server.local_addr(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(reply, RESPONSE);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn shutdown_closes_live_connections() {
    let (server, shutdown) = common::start_server(common::test_config());

    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.trigger();
    tokio::time::timeout(common::IO_TIMEOUT, server.join())
        .await
        .expect("reactor should stop")
        .unwrap();

    let reply = common::read_until_close(&mut stream).await;
    assert!(reply.is_empty());
}
