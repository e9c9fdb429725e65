//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use ws_router::config::parse_config;
use ws_router::http::ServerError;
use ws_router::lifecycle::{build_server, default_dispatcher, RoutingTrees, Shutdown};
use ws_router::net::{ChannelTransport, Connection, OutboundFrame, Socket, UpgradeRequest};
use ws_router::routing::Handler;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A router serving on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub trees: RoutingTrees,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

/// Start a server from TOML configuration text.
pub async fn start_server(config: &str) -> TestServer {
    let config = parse_config(config).expect("valid test config");
    let (server, trees) = build_server(&config, default_dispatcher()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestServer {
        addr,
        shutdown,
        trees,
        handle,
    }
}

/// Open a client connection, optionally sending an `X-Auth-Token` header.
pub async fn connect(addr: SocketAddr, path: &str, token: Option<&str>) -> Client {
    let mut request = format!("ws://{}{}", addr, path).into_client_request().unwrap();
    if let Some(token) = token {
        request
            .headers_mut()
            .insert("X-Auth-Token", HeaderValue::from_str(token).unwrap());
    }
    let (client, _) = connect_async(request).await.expect("websocket handshake");
    client
}

/// Next text frame from the server.
pub async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(READ_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a text frame");
        match frame {
            Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("expected text frame, got {:?}", other),
        }
    }
}

/// Skip text frames until the server closes. Returns the close code.
pub async fn next_close(client: &mut Client) -> Option<u16> {
    loop {
        let frame = tokio::time::timeout(READ_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a close frame");
        match frame {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

/// A socket backed by a channel transport for routing without a network.
pub fn channel_socket(path: &str) -> (Socket, UnboundedReceiver<OutboundFrame>) {
    channel_socket_with(UpgradeRequest::new(path))
}

pub fn channel_socket_with(request: UpgradeRequest) -> (Socket, UnboundedReceiver<OutboundFrame>) {
    let (transport, rx) = ChannelTransport::new();
    (Socket::new(Box::new(transport), request), rx)
}

/// A connection bound to `handler` with a channel transport.
pub fn channel_connection(
    handler: &Arc<Handler>,
    authenticated: bool,
) -> (Arc<Connection>, UnboundedReceiver<OutboundFrame>) {
    let (transport, rx) = ChannelTransport::new();
    let connection = Connection::new(
        Box::new(transport),
        UpgradeRequest::new("/ws"),
        Arc::downgrade(handler),
        authenticated,
    );
    (Arc::new(connection), rx)
}

/// A connection with no message handler.
pub fn detached_connection() -> (Arc<Connection>, UnboundedReceiver<OutboundFrame>) {
    let (transport, rx) = ChannelTransport::new();
    let connection = Connection::new(Box::new(transport), UpgradeRequest::new("/ws"), Weak::new(), true);
    (Arc::new(connection), rx)
}

/// Next frame, which must be text.
pub fn text_frame(rx: &mut UnboundedReceiver<OutboundFrame>) -> String {
    match rx.try_recv() {
        Ok(OutboundFrame::Text(text)) => text,
        other => panic!("expected text frame, got {:?}", other),
    }
}

pub fn error_json(code: u16, message: &str) -> String {
    format!(
        r#"{{"type":"result","success":false,"error":{{"code":{},"message":"{}"}}}}"#,
        code, message
    )
}
