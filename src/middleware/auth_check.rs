//! Blocks messages on connections that have not authenticated yet.

use crate::middleware::Middleware;
use crate::routing::handler::MessageContext;

/// Rejects every message with 401 until the connection is authenticated.
///
/// Authentication itself is not part of this middleware; place it after a
/// [`MsgAuthMiddleware`](crate::middleware::MsgAuthMiddleware) so the auth
/// message is consumed before the check runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthCheck;

impl Middleware for AuthCheck {
    fn name(&self) -> &str {
        "AuthCheck"
    }

    fn process(&self, ctx: &MessageContext<'_>) -> bool {
        if !ctx.connection.is_authenticated() {
            ctx.send_error_response(401, "Authentication required");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::Connection;
    use crate::net::transport::{ChannelTransport, OutboundFrame, UpgradeRequest};
    use crate::routing::message::Message;
    use crate::routing::templates::ResponseTemplates;
    use serde_json::Map;
    use std::sync::{Arc, Weak};

    #[test]
    fn blocks_until_authenticated() {
        let (transport, mut rx) = ChannelTransport::new();
        let conn = Arc::new(Connection::new(
            Box::new(transport),
            UpgradeRequest::new("/"),
            Weak::new(),
            false,
        ));
        let msg = Message::Json(Map::new());
        let ctx = MessageContext::new(&conn, "ping", &msg, ResponseTemplates::defaults());

        assert!(!AuthCheck.process(&ctx));
        match rx.try_recv().unwrap() {
            OutboundFrame::Text(t) => assert!(t.contains(r#""code":401"#)),
            other => panic!("unexpected frame {:?}", other),
        }

        conn.set_authenticated(true);
        assert!(AuthCheck.process(&ctx));
        assert!(rx.try_recv().is_err());
    }
}
