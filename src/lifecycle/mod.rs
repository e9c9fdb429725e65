//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     RouterConfig → message tree + connection tree → WsServer
//!
//! Shutdown (shutdown.rs):
//!     trigger → server closes connections (1001) → drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routing, then listener
//! - Ordered shutdown: stop accept, close, drain
//! - Drain has a timeout: remaining sessions are dropped after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_routing, build_server, default_dispatcher, RoutingTrees, StartupError};
