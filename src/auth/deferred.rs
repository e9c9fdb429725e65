//! Deferred, message-based authentication with a timeout.
//!
//! # Flow
//! ```text
//! connect → Connection(authenticated = false)
//!         → send auth_required
//!         → spawn timer(Weak<Connection>)
//!
//! timer fires:
//!     connection gone         → nothing
//!     authenticated meanwhile → nothing
//!     otherwise               → 408, close 1008 "Authentication timeout"
//! ```
//!
//! The timer is never cancelled. It only holds a `Weak` handle, so a client
//! that disconnects first is released right away and the timer finds the
//! handle stale.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::net::connection::Connection;
use crate::net::transport::{CloseCode, Socket};
use crate::observability::metrics;
use crate::routing::handler::Handler;

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Settings for connections that must authenticate in-band.
#[derive(Debug, Clone)]
pub struct MessageAuth {
    timeout: Duration,
    closes_connection_on_failure: bool,
}

impl MessageAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Close the connection when the timeout expires. Defaults to true.
    pub fn with_closes_connection_on_failure(mut self, close: bool) -> Self {
        self.closes_connection_on_failure = close;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn closes_connection_on_failure(&self) -> bool {
        self.closes_connection_on_failure
    }

    /// Create an unauthenticated connection, announce that authentication is
    /// required and arm the timeout.
    pub fn create_connection(&self, socket: Socket, handler: Weak<Handler>) -> Arc<Connection> {
        let connection = socket.into_connection(handler, false);
        connection.send_auth_required();
        self.schedule_timeout(Arc::downgrade(&connection));
        connection
    }

    fn schedule_timeout(&self, connection: Weak<Connection>) {
        let timeout = self.timeout;
        let closes = self.closes_connection_on_failure;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    auth_timeout_expired(&connection, closes);
                });
            }
            Err(_) => {
                tracing::warn!("No async runtime available, authentication timeout not scheduled");
            }
        }
    }
}

impl Default for MessageAuth {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_AUTH_TIMEOUT,
            closes_connection_on_failure: true,
        }
    }
}

/// Timer callback. Returns true if the connection was still unauthenticated
/// and the timeout was enforced.
pub fn auth_timeout_expired(connection: &Weak<Connection>, close: bool) -> bool {
    let Some(connection) = connection.upgrade() else {
        tracing::trace!("Authentication timer fired for released connection");
        return false;
    };
    if connection.is_authenticated() {
        return false;
    }

    tracing::info!(
        connection_id = %connection.id(),
        peer = %connection.request().peer(),
        "Authentication timeout"
    );
    metrics::record_auth_timeout();
    connection.send_error_response(408, "Closing connection after authentication timeout");
    if close {
        connection.close(CloseCode::PolicyViolated, "Authentication timeout");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::{ChannelTransport, OutboundFrame, UpgradeRequest};

    fn socket() -> (Socket, tokio::sync::mpsc::UnboundedReceiver<OutboundFrame>) {
        let (transport, rx) = ChannelTransport::new();
        (Socket::new(Box::new(transport), UpgradeRequest::new("/ws")), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_closes_unauthenticated_connection() {
        let root = Arc::new(Handler::default());
        let (socket, mut rx) = socket();
        let auth = MessageAuth::new().with_timeout(Duration::from_millis(500));

        let conn = auth.create_connection(socket, Arc::downgrade(&root));
        assert!(!conn.is_authenticated());
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text(r#"{"type":"auth_required"}"#.into()));

        tokio::time::sleep(Duration::from_millis(501)).await;
        tokio::task::yield_now().await;

        match rx.try_recv().unwrap() {
            OutboundFrame::Text(t) => assert!(t.contains(r#""code":408"#)),
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundFrame::Close {
                code: CloseCode::PolicyViolated,
                reason: "Authentication timeout".into()
            }
        );
        assert!(!conn.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn authenticated_connection_survives_timeout() {
        let root = Arc::new(Handler::default());
        let (socket, mut rx) = socket();
        let conn = MessageAuth::new().create_connection(socket, Arc::downgrade(&root));
        let _ = rx.try_recv();

        conn.set_authenticated(true);
        tokio::time::sleep(DEFAULT_AUTH_TIMEOUT + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert!(rx.try_recv().is_err());
        assert!(conn.is_open());
        assert!(!auth_timeout_expired(&Arc::downgrade(&conn), true));
    }

    #[tokio::test(start_paused = true)]
    async fn released_connection_is_not_resurrected() {
        let root = Arc::new(Handler::default());
        let (socket, rx) = socket();
        let conn = MessageAuth::new()
            .with_timeout(Duration::from_millis(100))
            .create_connection(socket, Arc::downgrade(&root));
        let observer = Arc::downgrade(&conn);

        drop(conn);
        drop(rx);
        assert!(observer.upgrade().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        assert!(observer.upgrade().is_none());
        assert!(!auth_timeout_expired(&observer, true));
    }

    #[test]
    fn timeout_without_close_only_reports() {
        let root = Arc::new(Handler::default());
        let (socket, mut rx) = socket();
        let conn = socket.into_connection(Arc::downgrade(&root), false);

        assert!(auth_timeout_expired(&Arc::downgrade(&conn), false));
        assert!(matches!(rx.try_recv().unwrap(), OutboundFrame::Text(_)));
        assert!(rx.try_recv().is_err());
        assert!(conn.is_open());
    }
}
