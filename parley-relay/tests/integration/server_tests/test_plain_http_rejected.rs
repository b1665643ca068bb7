use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use parley_relay::{RelayService, serve};

use crate::integration::init_tracing;

#[tokio::test]
async fn test_plain_http_rejected() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(serve(listener, RelayService::new()));

    // A request without upgrade headers never reaches the relay
    let mut stream = TcpStream::connect(addr).await.expect("Failed to connect");
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("Failed to write request");

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("Failed to read response");
    let response = String::from_utf8_lossy(&response);

    assert!(
        response.starts_with("HTTP/1.1 4"),
        "unexpected response: {response}"
    );
}
