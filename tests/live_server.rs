//! Tests that run the server on a real socket: the liveness page through an
//! HTTP client and the WebSocket handshake byte for byte.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use pairfinder_api::bootstrap::app_context::AppContext;
use pairfinder_api::bootstrap::config::Config;
use pairfinder_api::bootstrap::server::build_router;
use pairfinder_api::infrastructure::realtime::Hub;

fn test_config() -> Config {
    Config {
        api_port: 0,
        debug: false,
        cors_allowed_origins: vec!["*".to_string()],
        ping_interval_secs: 25,
        ping_timeout_secs: 20,
    }
}

async fn spawn_server_with(cfg: Config) -> (SocketAddr, JoinHandle<()>) {
    let ctx = AppContext::new(cfg, Hub::new());
    let app = build_router(&ctx).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

async fn spawn_server() -> (SocketAddr, JoinHandle<()>) {
    spawn_server_with(test_config()).await
}

/// Performs the WebSocket opening handshake against `/ws` and returns the
/// stream positioned just past the response headers.
async fn ws_connect(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ws HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Origin: https://app.example.com\r\n\
         \r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    // Read the response one byte at a time so nothing past the header block
    // is consumed.
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    assert!(head.to_ascii_lowercase().contains("sec-websocket-accept"));
    stream
}

/// Reads one short unfragmented server frame; returns the first header byte
/// (FIN + opcode) and the payload.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;
    let len = (header[1] & 0x7F) as usize;
    assert!(len < 126, "expected a short payload, got length byte {len}");
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((header[0], payload))
}

#[tokio::test]
async fn live_server_answers_liveness_check() {
    let (addr, handle) = spawn_server().await;

    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert_eq!(body, "<p>Server is up!</p>");

    handle.abort();
}

#[tokio::test]
async fn aborting_the_server_releases_the_port() {
    let (addr, handle) = spawn_server().await;
    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    handle.abort();
    let _ = handle.await;

    assert!(TcpListener::bind(addr).await.is_ok());
}

#[tokio::test]
async fn ws_handshake_upgrades_and_sends_session_hello() {
    let (addr, handle) = spawn_server().await;

    let mut stream = ws_connect(addr).await;

    // The first frame from the server is the session hello: an unmasked
    // final text frame with a short JSON payload.
    let (opcode, payload) = read_frame(&mut stream).await.unwrap();
    assert_eq!(opcode, 0x81, "expected a final text frame");

    let hello: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert!(hello["sid"].is_string());
    assert_eq!(hello["ping_interval_ms"], 25_000);
    assert_eq!(hello["ping_timeout_ms"], 20_000);

    handle.abort();
}

#[tokio::test]
async fn ws_keepalive_pings_then_times_out_silent_clients() {
    let cfg = Config {
        ping_interval_secs: 1,
        ping_timeout_secs: 1,
        ..test_config()
    };
    let (addr, handle) = spawn_server_with(cfg).await;

    let mut stream = ws_connect(addr).await;
    let (opcode, payload) = read_frame(&mut stream).await.unwrap();
    assert_eq!(opcode, 0x81);
    let hello: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(hello["ping_interval_ms"], 1_000);
    assert_eq!(hello["ping_timeout_ms"], 1_000);

    // A ping must arrive within one interval (plus scheduling slack).
    let (opcode, _) = tokio::time::timeout(Duration::from_secs(2), read_frame(&mut stream))
        .await
        .expect("no ping within one interval")
        .unwrap();
    assert_eq!(opcode, 0x89, "expected a ping frame");

    // Stay silent past interval + timeout. The server may send further pings
    // first, then must close the session: a close frame or a plain EOF.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match read_frame(&mut stream).await {
                Ok((0x88, _)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "session was not closed after the idle deadline");

    handle.abort();
}
