//! Header-based authentication at connect time.
//!
//! # Decision Table
//! ```text
//! token ok                                 → Accept(authenticated = true)
//! token bad/missing, closes_socket         → Reject (close 1008 "Authentication failed")
//! token bad/missing, creates_connection    → Accept(authenticated = false)
//! token bad/missing, neither flag          → Decline (parent tries next sibling)
//! ```

use std::sync::Arc;

use crate::auth::TokenAuthenticator;
use crate::net::transport::Socket;

pub const DEFAULT_TOKEN_HEADER: &str = "X-Auth-Token";

/// Outcome of the header check for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDecision {
    /// Create a connection with the given authentication state.
    Accept { authenticated: bool },
    /// Hand the socket back without closing it.
    Decline,
    /// Close the socket with a policy violation.
    Reject,
}

/// Header-based connection authentication settings.
#[derive(Clone)]
pub struct HeaderAuth {
    header_name: String,
    authenticator: Option<Arc<dyn TokenAuthenticator>>,
    closes_socket_on_failure: bool,
    creates_connection_on_failure: bool,
}

impl HeaderAuth {
    pub fn new(authenticator: Arc<dyn TokenAuthenticator>) -> Self {
        Self {
            authenticator: Some(authenticator),
            ..Self::default()
        }
    }

    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    /// Close the socket when authentication fails. Defaults to true.
    pub fn with_closes_socket_on_failure(mut self, close: bool) -> Self {
        self.closes_socket_on_failure = close;
        self
    }

    /// Still create an unauthenticated connection when authentication fails,
    /// leaving the decision to the message handlers. Defaults to false.
    pub fn with_creates_connection_on_failure(mut self, create: bool) -> Self {
        self.creates_connection_on_failure = create;
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn closes_socket_on_failure(&self) -> bool {
        self.closes_socket_on_failure
    }

    pub fn creates_connection_on_failure(&self) -> bool {
        self.creates_connection_on_failure
    }

    /// Evaluate the token header of `socket`.
    pub fn evaluate(&self, socket: &Socket) -> HeaderDecision {
        let path = socket.path();
        let authenticated = match socket.header(&self.header_name) {
            Some(token) => self
                .authenticator
                .as_ref()
                .map(|a| a.authenticate(path, &token))
                .unwrap_or(false),
            None => {
                tracing::debug!(
                    header = %self.header_name,
                    path,
                    peer = %socket.request().peer(),
                    "Missing authorization header"
                );
                false
            }
        };

        if authenticated {
            return HeaderDecision::Accept { authenticated: true };
        }
        if self.closes_socket_on_failure {
            tracing::debug!(path, peer = %socket.request().peer(), "Failed header authentication");
            return HeaderDecision::Reject;
        }
        if self.creates_connection_on_failure {
            HeaderDecision::Accept { authenticated: false }
        } else {
            HeaderDecision::Decline
        }
    }
}

impl Default for HeaderAuth {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_TOKEN_HEADER.to_string(),
            authenticator: None,
            closes_socket_on_failure: true,
            creates_connection_on_failure: false,
        }
    }
}

impl std::fmt::Debug for HeaderAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderAuth")
            .field("header_name", &self.header_name)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("closes_socket_on_failure", &self.closes_socket_on_failure)
            .field("creates_connection_on_failure", &self.creates_connection_on_failure)
            .finish()
    }
}
