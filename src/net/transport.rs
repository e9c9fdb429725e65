//! Transport handles and raw incoming sockets.
//!
//! # Responsibilities
//! - Abstract the underlying WebSocket behind a small send/close capability
//! - Carry the upgrade request (path, headers, peer address) with the socket
//! - Provide the channel-backed transport used by the axum front-end
//!
//! # Design Decisions
//! - All transport methods take `&self`; the handle is shared between the
//!   routing call and the writer task through a channel, never a lock
//! - A closed transport never sends again (sends return 0 bytes)

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::http::HeaderMap;
use tokio::sync::mpsc;

use crate::net::connection::Connection;
use crate::routing::handler::Handler;

/// WebSocket close codes used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    Normal,
    GoingAway,
    ProtocolError,
    PolicyViolated,
    TooBig,
    InternalError,
}

impl CloseCode {
    /// Numeric code as sent in the close frame.
    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::PolicyViolated => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::InternalError => 1011,
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Send/close capability of one client socket.
pub trait Transport: Send + Sync {
    /// Queue a text frame. Returns the number of bytes accepted, 0 if the
    /// transport is no longer valid.
    fn send_text(&self, text: &str) -> usize;

    /// Queue a binary frame. Same return contract as [`Transport::send_text`].
    fn send_binary(&self, data: &[u8]) -> usize;

    /// Close the socket with the given code and reason. Idempotent.
    fn close(&self, code: CloseCode, reason: &str);

    /// Whether frames can still be sent.
    fn is_valid(&self) -> bool;
}

/// Frames produced by a [`ChannelTransport`] for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Close { code: CloseCode, reason: String },
}

/// Transport that forwards frames into an unbounded channel.
///
/// The receiving half is drained by the socket writer task. When the writer
/// goes away (client disconnected) the transport becomes invalid.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    open: AtomicBool,
}

impl ChannelTransport {
    /// Create a transport together with the receiver of its frames.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                open: AtomicBool::new(true),
            },
            rx,
        )
    }
}

impl Transport for ChannelTransport {
    fn send_text(&self, text: &str) -> usize {
        if !self.is_valid() {
            return 0;
        }
        match self.tx.send(OutboundFrame::Text(text.to_string())) {
            Ok(()) => text.len(),
            Err(_) => 0,
        }
    }

    fn send_binary(&self, data: &[u8]) -> usize {
        if !self.is_valid() {
            return 0;
        }
        match self.tx.send(OutboundFrame::Binary(data.to_vec())) {
            Ok(()) => data.len(),
            Err(_) => 0,
        }
    }

    fn close(&self, code: CloseCode, reason: &str) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    fn is_valid(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

/// Request data captured at WebSocket upgrade time.
#[derive(Debug, Clone, Default)]
pub struct UpgradeRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub peer_addr: Option<SocketAddr>,
}

impl UpgradeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Header value as text. Lookup is case-insensitive. Bytes that are not
    /// valid UTF-8 are replaced, so a present header is never reported missing.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }

    /// Peer address for logging, `-` when unknown.
    pub fn peer(&self) -> String {
        self.peer_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// A raw incoming socket that has not been turned into a [`Connection`] yet.
///
/// The routing call owns the socket exclusively. It either converts it into a
/// connection, closes it, or hands it back to its parent.
pub struct Socket {
    transport: Box<dyn Transport>,
    request: UpgradeRequest,
}

impl Socket {
    pub fn new(transport: Box<dyn Transport>, request: UpgradeRequest) -> Self {
        Self { transport, request }
    }

    pub fn request(&self) -> &UpgradeRequest {
        &self.request
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }

    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.request.header(name)
    }

    pub fn is_valid(&self) -> bool {
        self.transport.is_valid()
    }

    pub fn send_text(&self, text: &str) -> usize {
        self.transport.send_text(text)
    }

    pub fn close(&self, code: CloseCode, reason: &str) {
        tracing::debug!(
            path = %self.request.path,
            peer = %self.request.peer(),
            code = %code,
            reason = reason,
            "Closing socket"
        );
        self.transport.close(code, reason);
    }

    /// Move the transport into a new connection bound to `handler`.
    pub fn into_connection(self, handler: Weak<Handler>, authenticated: bool) -> Arc<Connection> {
        Arc::new(Connection::new(
            self.transport,
            self.request,
            handler,
            authenticated,
        ))
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("request", &self.request)
            .field("valid", &self.transport.is_valid())
            .finish()
    }
}
