//! Middleware contracts and the built-in message middleware.
//!
//! # Contract
//! ```text
//! process(...) -> true   → routing continues with the next middleware
//! process(...) -> false  → routing stops here; the middleware already sent
//!                          any error and, for connection middleware,
//!                          closed the socket
//! ```
//!
//! # Design Decisions
//! - Middleware is stateless per call and shared behind `Arc`
//! - Execution order is insertion order on each node

pub mod auth_check;
pub mod msg_auth;

use crate::net::transport::Socket;
use crate::routing::handler::MessageContext;

pub use auth_check::AuthCheck;
pub use msg_auth::MsgAuthMiddleware;

/// Gate executed on a message-routing attempt.
pub trait Middleware: Send + Sync {
    /// Name of the middleware for logging purposes.
    fn name(&self) -> &str;

    /// Returns true if routing should continue. Errors should be sent through
    /// `ctx` so they use the templates of the node running the middleware.
    fn process(&self, ctx: &MessageContext<'_>) -> bool;
}

/// Gate executed on a connection-routing attempt.
///
/// Typical uses are peer address filters or required-header checks.
pub trait ConnectionMiddleware: Send + Sync {
    /// Name of the middleware for logging purposes.
    fn name(&self) -> &str;

    /// Returns true if routing should continue.
    fn process(&self, socket: &Socket) -> bool;
}
