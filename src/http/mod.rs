//! HTTP front-end.
//!
//! # Data Flow
//! ```text
//! TCP accept (axum::serve)
//!     → server.rs (Router, TraceLayer, graceful shutdown)
//!     → websocket.rs (upgrade, routing of the new socket, read loop)
//!     → routing::ConnectionHandler / net::Connection
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, ServerError, WsServer};
