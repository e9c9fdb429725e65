//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! New socket (path, headers)
//!     → connection_handler.rs (connection middleware, path patterns)
//!     → strategy (open / header auth / message auth)
//!     → Connection, or socket closed
//!
//! Frame on a Connection
//!     → handler.rs (JSON ingestion, message middleware, name patterns)
//!     → terminal processor (default 404/401, dispatch.rs, custom)
//! ```
//!
//! # Design Decisions
//! - Trees are built at startup, immutable at runtime
//! - Patterns are unanchored: first pattern occurring in the input wins
//! - Insertion order is match priority, not specificity

pub mod connection_handler;
pub mod dispatch;
pub mod handler;
pub mod matcher;
pub mod message;
pub mod templates;

pub use connection_handler::{ConnectionHandler, ConnectionStrategy, RouteOutcome};
pub use dispatch::Dispatcher;
pub use handler::{DefaultProcess, Handler, MessageContext, Process};
pub use matcher::Pattern;
pub use message::Message;
pub use templates::ResponseTemplates;
