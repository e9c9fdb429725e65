//! WebSocket session handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake and capture path, headers and peer
//! - Route the new socket through the connection tree
//! - Feed inbound frames to the routed connection
//! - Remove the connection from the table on disconnect
//!
//! # Data Flow
//! ```text
//! Client ──frames──→ read loop ──→ Connection::process_*_message ──→ Handler tree
//! Client ←─frames─── writer task ←── ChannelTransport ←── Connection::send_*
//! ```
//!
//! # Design Decisions
//! - The socket is split; a writer task owns the sink and drains the transport channel
//! - The read loop ends when the client closes or the writer sent a close frame
//! - An inbound message over the size limit is answered with close 1009
//! - The table holds the only long-lived strong reference; timers hold `Weak`

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderMap, Uri},
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use crate::http::server::AppState;
use crate::net::{ChannelTransport, CloseCode, OutboundFrame, Socket, UpgradeRequest};
use crate::observability::metrics;

/// How long a session waits for its close frame to be written after a read
/// error it answers.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) async fn upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let request = UpgradeRequest {
        path: uri.path().to_string(),
        headers,
        peer_addr: Some(peer),
    };
    let ws = if state.max_message_size > 0 {
        ws.max_message_size(state.max_message_size)
    } else {
        ws
    };
    ws.on_upgrade(move |socket| run_session(state, socket, request))
}

async fn run_session(state: AppState, socket: WebSocket, request: UpgradeRequest) {
    let (sink, mut stream) = socket.split();
    let (transport, outbound) = ChannelTransport::new();
    let mut writer = tokio::spawn(write_frames(sink, outbound));

    let socket = Socket::new(Box::new(transport), request);
    let Some(root) = state.root.clone() else {
        tracing::warn!(path = socket.path(), "No connection handler installed");
        socket.close(CloseCode::PolicyViolated, "Internal server error");
        metrics::record_connection("rejected");
        let _ = writer.await;
        return;
    };

    let Some(connection) = root.route(socket) else {
        metrics::record_connection("rejected");
        let _ = writer.await;
        return;
    };

    metrics::record_connection(if connection.is_authenticated() {
        "authenticated"
    } else {
        "pending"
    });
    state.connections.insert(connection.clone());

    let mut flush_close = false;
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => connection.process_text_message(text.as_str()),
                Some(Ok(Message::Binary(data))) => connection.process_binary_message(&data),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(
                        connection_id = %connection.id(),
                        code = frame.as_ref().map(|f| f.code),
                        "Client closed connection"
                    );
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %connection.id(), error = %e, "WebSocket read error");
                    if is_capacity_error(e) {
                        connection.close(CloseCode::TooBig, "Message too big");
                        flush_close = true;
                    }
                    break;
                }
                None => break,
            },
            _ = &mut writer => break,
        }
    }

    if flush_close {
        let _ = tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await;
    }
    state.connections.remove(connection.id());
    writer.abort();
}

/// Returns true if the transport refused an inbound message for its size.
fn is_capacity_error(error: axum::Error) -> bool {
    matches!(
        error.into_inner().downcast_ref::<tungstenite::Error>(),
        Some(tungstenite::Error::Capacity(_))
    )
}

async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        let (message, last) = match frame {
            OutboundFrame::Text(text) => (Message::Text(text.into()), false),
            OutboundFrame::Binary(data) => (Message::Binary(data.into()), false),
            OutboundFrame::Close { code, reason } => (
                Message::Close(Some(CloseFrame {
                    code: code.as_u16(),
                    reason: reason.into(),
                })),
                true,
            ),
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "WebSocket write failed");
            break;
        }
        if last {
            break;
        }
    }
}
