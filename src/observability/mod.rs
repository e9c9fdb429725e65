//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Routing, auth and server code produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Connection ids flow through every log event of a session
//! - Metric updates are cheap; recording without an installed exporter is a no-op

pub mod logging;
pub mod metrics;
