//! Connection layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded WebSocket
//!     → transport.rs (Socket: transport handle + upgrade request)
//!     → [connection routing decides]
//!     → connection.rs (Connection: auth flag, owned transport, weak handler)
//!     → table.rs (strong reference until disconnect)
//!
//! Connection lifetime:
//!     Socket → Connection → (disconnect) → released
//!                  ↑
//!           Weak observers (auth timers) never extend it
//! ```
//!
//! # Design Decisions
//! - A socket is owned by exactly one routing call at a time
//! - The table is the only long-lived strong owner
//! - Close is idempotent at both the connection and transport level

pub mod connection;
pub mod table;
pub mod transport;

pub use connection::{Connection, ConnectionId};
pub use table::ConnectionTable;
pub use transport::{ChannelTransport, CloseCode, OutboundFrame, Socket, Transport, UpgradeRequest};
