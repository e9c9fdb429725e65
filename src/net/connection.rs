//! Client session state.
//!
//! # Responsibilities
//! - Own the transport of one client for the lifetime of the session
//! - Track the authentication flag
//! - Feed incoming frames into the message handler tree
//! - Render error and auth-required responses from the handler templates
//!
//! # Design Decisions
//! - The message handler is held weakly; the tree outlives connections
//! - Authentication only changes through `set_authenticated`
//! - Once closed, sends are no-ops even if the transport would still accept

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::net::transport::{CloseCode, Transport, UpgradeRequest};
use crate::routing::handler::Handler;
use crate::routing::templates::ResponseTemplates;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live client session.
pub struct Connection {
    id: ConnectionId,
    authenticated: AtomicBool,
    closed: AtomicBool,
    handler: Weak<Handler>,
    transport: Box<dyn Transport>,
    request: UpgradeRequest,
}

impl Connection {
    pub fn new(
        transport: Box<dyn Transport>,
        request: UpgradeRequest,
        handler: Weak<Handler>,
        authenticated: bool,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            authenticated: AtomicBool::new(authenticated),
            closed: AtomicBool::new(false),
            handler,
            transport,
            request,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn request(&self) -> &UpgradeRequest {
        &self.request
    }

    /// Request path the client connected to.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// Root message handler, if it is still alive.
    pub fn handler(&self) -> Option<Arc<Handler>> {
        self.handler.upgrade()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Whether the connection can still send frames.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.transport.is_valid()
    }

    /// Route a text frame through the message handler tree.
    pub fn process_text_message(self: &Arc<Self>, text: &str) {
        match self.handler() {
            Some(handler) => handler.route_text_message(self, text),
            None => self.send_error_response(500, "No message handler defined"),
        }
    }

    /// Route a binary frame through the message handler tree.
    pub fn process_binary_message(self: &Arc<Self>, data: &[u8]) {
        match self.handler() {
            Some(handler) => handler.route_binary_message(self, data),
            None => self.send_error_response(500, "No message handler defined"),
        }
    }

    pub fn send_text_message(&self, text: &str) -> usize {
        if !self.is_open() {
            tracing::debug!(connection_id = %self.id, "Connection closed, dropping text message");
            return 0;
        }
        self.transport.send_text(text)
    }

    pub fn send_binary_message(&self, data: &[u8]) -> usize {
        if !self.is_open() {
            tracing::debug!(connection_id = %self.id, "Connection closed, dropping binary message");
            return 0;
        }
        self.transport.send_binary(data)
    }

    /// Send an error response rendered with the root handler's templates.
    pub fn send_error_response(&self, code: u16, message: &str) {
        let handler = self.handler();
        let templates = handler
            .as_ref()
            .map(|h| h.templates())
            .unwrap_or_else(|| ResponseTemplates::defaults());
        self.send_error_with(templates, code, message);
    }

    /// Send an error response rendered with explicit templates.
    pub fn send_error_with(&self, templates: &ResponseTemplates, code: u16, message: &str) {
        tracing::debug!(connection_id = %self.id, code, message, "Sending error response");
        self.send_text_message(&templates.render_error(code, message));
    }

    pub fn send_auth_required(&self) {
        tracing::debug!(connection_id = %self.id, "Sending auth required message");
        let handler = self.handler();
        let templates = handler
            .as_ref()
            .map(|h| h.templates())
            .unwrap_or_else(|| ResponseTemplates::defaults());
        self.send_text_message(templates.auth_required());
    }

    /// Close the connection. Later calls and sends are no-ops.
    pub fn close(&self, code: CloseCode, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(
            connection_id = %self.id,
            peer = %self.request.peer(),
            code = %code,
            reason = reason,
            "Close request"
        );
        self.transport.close(code, reason);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("path", &self.request.path)
            .field("authenticated", &self.is_authenticated())
            .field("open", &self.is_open())
            .finish()
    }
}
