//! WebSocket connection and message router.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client upgrade ──▶ http (axum) ──▶ ConnectionHandler tree ──▶ Connection
//!                                      middleware, path patterns,   (net)
//!                                      open / header / message auth
//!
//!   Client frame ────▶ Connection ───▶ Handler tree ──────────────▶ processor
//!                                      JSON ingestion, middleware,   (default,
//!                                      message name patterns         dispatcher)
//!
//!   Cross-cutting: config (TOML), observability (tracing, metrics),
//!                  lifecycle (startup assembly, signals, shutdown)
//! ```

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod middleware;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::RouterConfig;
pub use http::WsServer;
pub use lifecycle::Shutdown;
pub use net::{CloseCode, Connection, Socket};
pub use routing::{ConnectionHandler, Handler, Pattern};
