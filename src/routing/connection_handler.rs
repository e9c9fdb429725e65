//! Connection handler tree.
//!
//! # Responsibilities
//! - Run connection middleware on each new socket
//! - Recurse into sub-handlers whose pattern occurs in the request path
//! - Turn the socket into a [`Connection`] according to the node's strategy
//!
//! # Design Decisions
//! - The socket is moved through the tree; a declining child hands it back
//!   so the next matching sibling can try
//! - Routing stops as soon as a child produced a connection or the socket
//!   is no longer valid
//! - An open or message-auth node without a message handler closes sockets
//!   that reach it; header auth still creates the connection, which then
//!   answers every message with a 500

use std::sync::{Arc, Weak};

use crate::auth::{HeaderAuth, HeaderDecision, MessageAuth};
use crate::middleware::ConnectionMiddleware;
use crate::net::connection::Connection;
use crate::net::transport::{CloseCode, Socket};
use crate::routing::handler::Handler;
use crate::routing::matcher::Pattern;

/// Result of routing one socket through a connection handler node.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The socket became a connection.
    Connected(Arc<Connection>),
    /// The node declined; the caller owns the socket again.
    Declined(Socket),
    /// The socket was closed or released.
    Closed,
}

/// How a node turns an accepted socket into a connection.
#[derive(Debug, Clone, Default)]
pub enum ConnectionStrategy {
    /// No authentication: connections start authenticated.
    #[default]
    Open,
    /// Token header checked at connect time.
    HeaderAuth(HeaderAuth),
    /// Unauthenticated until an auth message arrives within the timeout.
    MessageAuth(MessageAuth),
}

struct ConnSubHandler {
    pattern: Pattern,
    handler: Arc<ConnectionHandler>,
}

/// A node in the connection-path routing tree.
pub struct ConnectionHandler {
    name: String,
    middleware: Vec<Arc<dyn ConnectionMiddleware>>,
    sub_handlers: Vec<ConnSubHandler>,
    message_handler: Option<Arc<Handler>>,
    strategy: ConnectionStrategy,
}

impl ConnectionHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            middleware: Vec::new(),
            sub_handlers: Vec::new(),
            message_handler: None,
            strategy: ConnectionStrategy::Open,
        }
    }

    pub fn with_message_handler(mut self, handler: Arc<Handler>) -> Self {
        self.message_handler = Some(handler);
        self
    }

    pub fn with_strategy(mut self, strategy: ConnectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> &ConnectionStrategy {
        &self.strategy
    }

    /// Root message handler for created connections.
    pub fn message_handler(&self) -> Option<&Arc<Handler>> {
        self.message_handler.as_ref()
    }

    pub fn set_message_handler(&mut self, handler: Arc<Handler>) -> &mut Self {
        self.message_handler = Some(handler);
        self
    }

    /// Append connection middleware. Execution follows insertion order.
    pub fn add_middleware(&mut self, middleware: Arc<dyn ConnectionMiddleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Append a sub-handler. Earlier patterns take priority.
    pub fn add_sub_handler(&mut self, pattern: Pattern, handler: Arc<ConnectionHandler>) -> &mut Self {
        self.sub_handlers.push(ConnSubHandler { pattern, handler });
        self
    }

    /// Route a new socket. Returns the connection, or `None` if the socket
    /// was rejected.
    pub fn route(&self, socket: Socket) -> Option<Arc<Connection>> {
        let path = socket.path().to_string();
        let peer = socket.request().peer();
        match self.route_socket(socket) {
            RouteOutcome::Connected(conn) => {
                tracing::debug!(
                    connection_id = %conn.id(),
                    path = %path,
                    peer = %peer,
                    authenticated = conn.is_authenticated(),
                    "Created client connection"
                );
                Some(conn)
            }
            RouteOutcome::Declined(socket) => {
                tracing::debug!(path = %path, peer = %peer, "No handler accepted connection, releasing socket");
                drop(socket);
                None
            }
            RouteOutcome::Closed => None,
        }
    }

    /// Route a socket through this node, handing it back if declined.
    pub fn route_socket(&self, socket: Socket) -> RouteOutcome {
        tracing::debug!(
            handler = %self.name,
            path = socket.path(),
            peer = %socket.request().peer(),
            "Routing connection through middleware"
        );

        for middleware in &self.middleware {
            if !middleware.process(&socket) {
                tracing::debug!(
                    handler = %self.name,
                    middleware = middleware.name(),
                    peer = %socket.request().peer(),
                    "Middleware stopped processing, releasing socket"
                );
                return RouteOutcome::Closed;
            }
        }

        let mut socket = socket;
        for sub in &self.sub_handlers {
            if !sub.pattern.matches(socket.path()) {
                continue;
            }
            tracing::debug!(
                pattern = %sub.pattern,
                path = socket.path(),
                sub_handler = sub.handler.name(),
                "Path match"
            );
            match sub.handler.route_socket(socket) {
                RouteOutcome::Declined(returned) if returned.is_valid() => socket = returned,
                RouteOutcome::Declined(_) => return RouteOutcome::Closed,
                outcome => return outcome,
            }
        }

        self.process(socket)
    }

    /// Terminal step when no sub-handler produced a connection.
    fn process(&self, socket: Socket) -> RouteOutcome {
        match &self.strategy {
            ConnectionStrategy::Open | ConnectionStrategy::MessageAuth(_)
                if self.message_handler.is_none() =>
            {
                self.reject_endpoint(socket)
            }
            ConnectionStrategy::Open => RouteOutcome::Connected(self.create_connection(socket, true)),
            ConnectionStrategy::HeaderAuth(auth) => match auth.evaluate(&socket) {
                HeaderDecision::Accept { authenticated } => {
                    RouteOutcome::Connected(self.create_connection(socket, authenticated))
                }
                HeaderDecision::Decline => RouteOutcome::Declined(socket),
                HeaderDecision::Reject => {
                    socket.close(CloseCode::PolicyViolated, "Authentication failed");
                    RouteOutcome::Closed
                }
            },
            ConnectionStrategy::MessageAuth(auth) => {
                RouteOutcome::Connected(auth.create_connection(socket, self.handler_ref()))
            }
        }
    }

    fn reject_endpoint(&self, socket: Socket) -> RouteOutcome {
        tracing::debug!(
            handler = %self.name,
            path = socket.path(),
            peer = %socket.request().peer(),
            "No connection processing available, closing socket"
        );
        let reason = format!("Invalid endpoint: {}", socket.path());
        socket.close(CloseCode::PolicyViolated, &reason);
        RouteOutcome::Closed
    }

    fn create_connection(&self, socket: Socket, authenticated: bool) -> Arc<Connection> {
        socket.into_connection(self.handler_ref(), authenticated)
    }

    fn handler_ref(&self) -> Weak<Handler> {
        self.message_handler
            .as_ref()
            .map(Arc::downgrade)
            .unwrap_or_default()
    }
}

impl Default for ConnectionHandler {
    fn default() -> Self {
        Self::new("RootHandler")
    }
}

impl std::fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("name", &self.name)
            .field("middleware", &self.middleware.len())
            .field(
                "sub_handlers",
                &self
                    .sub_handlers
                    .iter()
                    .map(|s| s.pattern.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("has_message_handler", &self.message_handler.is_some())
            .field("strategy", &self.strategy)
            .finish()
    }
}
