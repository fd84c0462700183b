use super::{EchoOutcome, HandshakeError, Session, SessionConfig, Upgrader, UpgraderConfig};
use bytes::Bytes;
use crate::EchoError;
use crate::http::read_request_head;
use futures_util::{SinkExt, StreamExt};
use http::{Request, StatusCode, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn upgrade_request(path: &str) -> http::request::Builder {
    Request::get(path)
        .header(header::HOST, "localhost:8080")
        .header(header::CONNECTION, "Upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
}

async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (server, client)
}

#[test]
fn test_negotiate_accepts_valid_upgrade() {
    let upgrader = Upgrader::default();
    let request = upgrade_request("/ws").body(()).unwrap();

    let response = upgrader.negotiate(&request).unwrap();

    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
    assert_eq!(
        response.headers()[header::SEC_WEBSOCKET_ACCEPT],
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
    );
}

#[test]
fn test_negotiate_wrong_path_is_not_found() {
    let upgrader = Upgrader::default();
    let request = upgrade_request("/socket").body(()).unwrap();

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::NotFound(ref p) if p == "/socket"));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert_eq!(err.to_response().status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_negotiate_rejects_wrong_method() {
    let upgrader = Upgrader::default();
    let request = upgrade_request("/ws")
        .method(http::Method::POST)
        .body(())
        .unwrap();

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::MethodNotAllowed));
    let response = err.to_response();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET");
}

#[test]
fn test_negotiate_rejects_plain_request() {
    let upgrader = Upgrader::default();
    let request = Request::get("/ws")
        .header(header::HOST, "localhost:8080")
        .body(())
        .unwrap();

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::BadRequest(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_negotiate_rejects_unsupported_version() {
    let upgrader = Upgrader::default();
    let mut request = upgrade_request("/ws").body(()).unwrap();
    request
        .headers_mut()
        .insert(header::SEC_WEBSOCKET_VERSION, "8".parse().unwrap());

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::UnsupportedVersion));
    let response = err.to_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::SEC_WEBSOCKET_VERSION], "13");
    assert_eq!(response.body(), &Bytes::from_static(b"Bad Request\n"));
}

#[test]
fn test_negotiate_rejects_http10_upgrade() {
    let upgrader = Upgrader::default();
    let request = upgrade_request("/ws")
        .version(http::Version::HTTP_10)
        .body(())
        .unwrap();

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::BadRequest(_)));
    let response = err.to_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::SEC_WEBSOCKET_VERSION], "13");
}

#[test]
fn test_negotiate_rejects_missing_key() {
    let upgrader = Upgrader::default();
    let mut request = upgrade_request("/ws").body(()).unwrap();
    request.headers_mut().remove(header::SEC_WEBSOCKET_KEY);

    let err = upgrader.negotiate(&request).unwrap_err();

    assert!(matches!(err, HandshakeError::BadRequest(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_negotiate_checks_origin() {
    let upgrader = Upgrader::default();

    let same = upgrade_request("/ws")
        .header(header::ORIGIN, "http://LOCALHOST:8080")
        .body(())
        .unwrap();
    assert!(upgrader.negotiate(&same).is_ok());

    let cross = upgrade_request("/ws")
        .header(header::ORIGIN, "https://evil.example")
        .body(())
        .unwrap();
    let err = upgrader.negotiate(&cross).unwrap_err();
    assert!(matches!(err, HandshakeError::OriginRejected));
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.to_response().body(), &Bytes::from_static(b"Forbidden\n"));

    let permissive = Upgrader::new(UpgraderConfig {
        check_origin: false,
        ..UpgraderConfig::default()
    });
    assert!(permissive.negotiate(&cross).is_ok());
}

#[test]
fn test_websocket_config_uses_buffer_sizes() {
    let config = UpgraderConfig {
        max_message_size: Some(4096),
        ..UpgraderConfig::default()
    };

    let ws = config.websocket_config();

    assert_eq!(ws.read_buffer_size, 1024);
    assert_eq!(ws.write_buffer_size, 1024);
    assert_eq!(ws.max_message_size, Some(4096));
    assert_eq!(ws.max_frame_size, Some(4096));
}

#[tokio::test]
async fn test_upgrade_handshake_end_to_end() {
    let (mut server_io, client_io) = tokio::io::duplex(64 * 1024);
    let active = Arc::new(AtomicUsize::new(0));

    let server_active = active.clone();
    let server = tokio::spawn(async move {
        let head = read_request_head(&mut server_io, 8192).await.unwrap();
        let ws = Upgrader::default().upgrade(server_io, head).await.unwrap();
        Session::new(ws, peer(), SessionConfig::default(), server_active)
            .run()
            .await
    });

    let (mut client, response) = tokio_tungstenite::client_async("ws://localhost/ws", client_io)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    client.send(Message::text("hello")).await.unwrap();
    let reply = client.next().await.unwrap().unwrap();
    assert_eq!(reply, Message::text("hello"));

    client.close(None).await.unwrap();
    let outcome = server.await.unwrap();

    assert_eq!(outcome, EchoOutcome::PeerClosed);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upgrade_wrong_path_writes_not_found() {
    let (mut server_io, mut client_io) = tokio::io::duplex(64 * 1024);

    client_io
        .write_all(b"GET /chat HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\n")
        .await
        .unwrap();

    let head = read_request_head(&mut server_io, 8192).await.unwrap();
    let result = Upgrader::default().upgrade(server_io, head).await;
    assert!(matches!(
        result,
        Err(EchoError::Handshake(HandshakeError::NotFound(_)))
    ));

    let mut raw = String::new();
    client_io.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn test_session_echoes_text_and_binary_in_order() {
    let (server, mut client) = ws_pair().await;
    let active = Arc::new(AtomicUsize::new(0));
    let session = Session::new(server, peer(), SessionConfig::default(), active.clone());
    assert_eq!(active.load(Ordering::SeqCst), 1);
    assert_eq!(session.peer_addr(), peer());

    let handle = tokio::spawn(session.run());

    let sent = vec![
        Message::text("first"),
        Message::binary(vec![0u8, 1, 2, 255]),
        Message::text("third"),
        Message::binary(Vec::new()),
    ];
    for message in &sent {
        client.send(message.clone()).await.unwrap();
    }
    for expected in &sent {
        let reply = client.next().await.unwrap().unwrap();
        assert_eq!(&reply, expected);
    }

    client.close(None).await.unwrap();
    assert_eq!(handle.await.unwrap(), EchoOutcome::PeerClosed);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_does_not_echo_pings() {
    let (server, mut client) = ws_pair().await;
    let active = Arc::new(AtomicUsize::new(0));
    let handle = tokio::spawn(Session::new(server, peer(), SessionConfig::default(), active).run());

    client.send(Message::Ping(b"are you there".to_vec().into())).await.unwrap();
    client.send(Message::text("after ping")).await.unwrap();

    // The pong comes from the protocol layer, then the echoed text
    let first = client.next().await.unwrap().unwrap();
    assert!(first.is_pong());
    let second = client.next().await.unwrap().unwrap();
    assert_eq!(second, Message::text("after ping"));

    client.close(None).await.unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_session_released_when_peer_vanishes() {
    let (server, client) = ws_pair().await;
    let active = Arc::new(AtomicUsize::new(0));
    let handle = tokio::spawn(Session::new(server, peer(), SessionConfig::default(), active.clone()).run());

    // No close frame: the transport simply goes away
    drop(client);

    let outcome = handle.await.unwrap();
    assert!(matches!(
        outcome,
        EchoOutcome::ReceiveFailed | EchoOutcome::PeerClosed
    ));
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_read_timeout() {
    let (server, _client) = ws_pair().await;
    let active = Arc::new(AtomicUsize::new(0));
    let config = SessionConfig {
        read_timeout: Some(Duration::from_millis(50)),
        write_timeout: None,
    };

    let outcome = Session::new(server, peer(), config, active.clone()).run().await;

    assert_eq!(outcome, EchoOutcome::TimedOut);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_rejects_oversized_message_when_limited() {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let limited = UpgraderConfig {
        max_message_size: Some(16),
        ..UpgraderConfig::default()
    };
    let server =
        WebSocketStream::from_raw_socket(server_io, Role::Server, Some(limited.websocket_config()))
            .await;
    let mut client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    let active = Arc::new(AtomicUsize::new(0));
    let handle = tokio::spawn(Session::new(server, peer(), SessionConfig::default(), active).run());

    client.send(Message::binary(vec![7u8; 64])).await.unwrap();

    assert_eq!(handle.await.unwrap(), EchoOutcome::ReceiveFailed);
}
