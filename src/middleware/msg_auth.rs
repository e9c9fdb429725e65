//! In-band token authentication.
//!
//! # Behavior
//! ```text
//! name differs from msg_name (non-empty)  → continue
//! payload is not a JSON object            → 400, continue
//! token field absent                      → continue
//! token field present                     → authenticate(path, token),
//!                                           set flag, consume message
//!     failed + closes_socket_on_failure   → 403, close 1008 "Invalid credentials"
//! ```

use std::sync::Arc;

use crate::auth::TokenAuthenticator;
use crate::middleware::Middleware;
use crate::net::transport::CloseCode;
use crate::routing::handler::MessageContext;

pub const DEFAULT_AUTH_MESSAGE: &str = "auth";
pub const DEFAULT_TOKEN_FIELD: &str = "access_token";

/// Authenticates a connection from a token carried in a JSON message.
#[derive(Clone)]
pub struct MsgAuthMiddleware {
    msg_name: String,
    token_field: String,
    authenticator: Option<Arc<dyn TokenAuthenticator>>,
    closes_socket_on_failure: bool,
}

impl MsgAuthMiddleware {
    pub fn new(authenticator: Arc<dyn TokenAuthenticator>) -> Self {
        Self {
            authenticator: Some(authenticator),
            ..Self::default()
        }
    }

    /// Message name that carries the token. Empty matches every message.
    pub fn with_msg_name(mut self, msg_name: impl Into<String>) -> Self {
        self.msg_name = msg_name.into();
        self
    }

    pub fn with_token_field(mut self, field: impl Into<String>) -> Self {
        self.token_field = field.into();
        self
    }

    /// Close the socket after a failed attempt. Defaults to true.
    pub fn with_closes_socket_on_failure(mut self, close: bool) -> Self {
        self.closes_socket_on_failure = close;
        self
    }

    pub fn msg_name(&self) -> &str {
        &self.msg_name
    }

    pub fn token_field(&self) -> &str {
        &self.token_field
    }

    pub fn closes_socket_on_failure(&self) -> bool {
        self.closes_socket_on_failure
    }
}

impl Default for MsgAuthMiddleware {
    fn default() -> Self {
        Self {
            msg_name: DEFAULT_AUTH_MESSAGE.to_string(),
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
            authenticator: None,
            closes_socket_on_failure: true,
        }
    }
}

impl Middleware for MsgAuthMiddleware {
    fn name(&self) -> &str {
        "MsgAuth"
    }

    fn process(&self, ctx: &MessageContext<'_>) -> bool {
        let connection = ctx.connection;
        let msg_name = ctx.name;
        if !self.msg_name.is_empty() && msg_name != self.msg_name {
            return true;
        }

        let Some(obj) = ctx.message.as_object() else {
            tracing::warn!(connection_id = %connection.id(), msg_name, "Expected JSON object message");
            ctx.send_error_response(400, "Expected json object payload");
            return true;
        };

        let Some(token) = obj.get(&self.token_field) else {
            return true;
        };
        let token = token.as_str().unwrap_or_default();

        let authenticated = self
            .authenticator
            .as_ref()
            .map(|a| a.authenticate(connection.path(), token))
            .unwrap_or(false);
        connection.set_authenticated(authenticated);

        tracing::debug!(
            connection_id = %connection.id(),
            path = connection.path(),
            authenticated,
            "In-band authentication"
        );

        if !authenticated && self.closes_socket_on_failure {
            ctx.send_error_response(403, "Authentication failed");
            connection.close(CloseCode::PolicyViolated, "Invalid credentials");
        }
        false
    }
}

impl std::fmt::Debug for MsgAuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgAuthMiddleware")
            .field("msg_name", &self.msg_name)
            .field("token_field", &self.token_field)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("closes_socket_on_failure", &self.closes_socket_on_failure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuthenticator;
    use crate::net::connection::Connection;
    use crate::net::transport::{ChannelTransport, OutboundFrame, UpgradeRequest};
    use crate::routing::message::{parse_text, Message};
    use crate::routing::templates::ResponseTemplates;
    use std::sync::Weak;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn conn() -> (Arc<Connection>, UnboundedReceiver<OutboundFrame>) {
        let (transport, rx) = ChannelTransport::new();
        let conn = Connection::new(Box::new(transport), UpgradeRequest::new("/ws"), Weak::new(), false);
        (Arc::new(conn), rx)
    }

    fn middleware() -> MsgAuthMiddleware {
        MsgAuthMiddleware::new(Arc::new(StaticTokenAuthenticator::new(["T"])))
    }

    fn check(mw: &MsgAuthMiddleware, conn: &Arc<Connection>, text: &str) -> bool {
        let (name, msg) = parse_text(text).unwrap();
        mw.process(&MessageContext::new(conn, &name, &msg, ResponseTemplates::defaults()))
    }

    #[test]
    fn valid_token_authenticates_and_consumes() {
        let (conn, mut rx) = conn();
        assert!(!check(&middleware(), &conn, r#"{"type":"auth","access_token":"T"}"#));
        assert!(conn.is_authenticated());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn invalid_token_closes_with_403() {
        let (conn, mut rx) = conn();
        assert!(!check(&middleware(), &conn, r#"{"type":"auth","access_token":"X"}"#));
        assert!(!conn.is_authenticated());
        match rx.try_recv().unwrap() {
            OutboundFrame::Text(t) => assert!(t.contains(r#""code":403,"message":"Authentication failed""#)),
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Close {
                code: CloseCode::PolicyViolated,
                reason: "Invalid credentials".into()
            }
        );
    }

    #[test]
    fn invalid_token_without_close_keeps_connection() {
        let (conn, mut rx) = conn();
        let mw = middleware().with_closes_socket_on_failure(false);
        assert!(!check(&mw, &conn, r#"{"type":"auth","access_token":"X"}"#));
        assert!(conn.is_open());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn other_messages_pass_through() {
        let (conn, _rx) = conn();
        let mw = middleware();
        assert!(check(&mw, &conn, r#"{"type":"ping","access_token":"T"}"#));
        assert!(check(&mw, &conn, r#"{"type":"auth"}"#));
        assert!(!conn.is_authenticated());
    }

    #[test]
    fn empty_name_matches_any_message() {
        let (conn, _rx) = conn();
        let mw = middleware().with_msg_name("").with_token_field("token");
        assert!(!check(&mw, &conn, r#"{"type":"hello","token":"T"}"#));
        assert!(conn.is_authenticated());
    }

    #[test]
    fn binary_payload_under_auth_name_gets_400() {
        let (conn, mut rx) = conn();
        let mw = middleware().with_msg_name("");
        let msg = Message::Binary(vec![1]);
        assert!(mw.process(&MessageContext::new(
            &conn,
            "binary",
            &msg,
            ResponseTemplates::defaults()
        )));
        match rx.try_recv().unwrap() {
            OutboundFrame::Text(t) => assert!(t.contains(r#""code":400"#)),
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
