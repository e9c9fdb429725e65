//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the WebSocket upgrade handler
//! - Wire up middleware (tracing)
//! - Bind server to listener
//! - Close every tracked connection when shutdown is signalled
//! - Drain sessions before returning

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::websocket::upgrade_handler;
use crate::net::{CloseCode, ConnectionTable};
use crate::routing::ConnectionHandler;

/// How long `run` waits for sessions to finish after shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// State injected into the upgrade handler.
#[derive(Clone)]
pub struct AppState {
    pub root: Option<Arc<ConnectionHandler>>,
    pub connections: Arc<ConnectionTable>,
    pub max_message_size: usize,
}

/// WebSocket front-end for a connection routing tree.
pub struct WsServer {
    state: AppState,
}

impl WsServer {
    /// Create a server for `root`. Without a root every socket is closed.
    pub fn new(root: Option<Arc<ConnectionHandler>>) -> Self {
        Self {
            state: AppState {
                root,
                connections: Arc::new(ConnectionTable::new()),
                max_message_size: 0,
            },
        }
    }

    /// Limit inbound message size in bytes. 0 keeps the transport default.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.state.max_message_size = max;
        self
    }

    pub fn connections(&self) -> Arc<ConnectionTable> {
        Arc::clone(&self.state.connections)
    }

    /// Build the Axum router. Every path is an upgrade endpoint; the routing
    /// tree decides what the path means.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(upgrade_handler)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` fires, then close all connections with
    /// GoingAway and wait up to [`DRAIN_TIMEOUT`] for sessions to end.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "WebSocket server starting");

        let connections = self.connections();
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                connections.close_all(CloseCode::GoingAway, "Server shutting down");
            })
            .await?;

        drain(&self.state.connections, DRAIN_TIMEOUT).await;
        tracing::info!("WebSocket server stopped");
        Ok(())
    }
}

async fn drain(connections: &ConnectionTable, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !connections.is_empty() {
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(remaining = connections.len(), "Drain timeout, dropping sessions");
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
