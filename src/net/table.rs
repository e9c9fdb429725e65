//! Connection table.
//!
//! Holds the strong references to every routed connection, keyed by id.
//! Timers and other observers keep `Weak` handles, so removing an entry on
//! disconnect releases the connection immediately.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::net::connection::{Connection, ConnectionId};
use crate::net::transport::CloseCode;
use crate::observability::metrics;

/// Tracks live connections for disconnect cleanup and shutdown broadcast.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    closing: OnceLock<(CloseCode, String)>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take shared ownership of a routed connection. After [`close_all`]
    /// the connection is closed with the same code as soon as it is tracked.
    ///
    /// [`close_all`]: ConnectionTable::close_all
    pub fn insert(&self, connection: Arc<Connection>) {
        self.connections.insert(connection.id(), Arc::clone(&connection));
        metrics::set_active_connections(self.connections.len());

        if let Some((code, reason)) = self.closing.get() {
            tracing::debug!(connection_id = %connection.id(), code = %code, "Closing connection routed during shutdown");
            connection.close(*code, reason);
        }
    }

    /// Drop the table's reference. Returns the entry if it was tracked.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(&id).map(|(_, conn)| conn);
        if removed.is_some() {
            tracing::debug!(connection_id = %id, "Client disconnected, releasing connection");
            metrics::set_active_connections(self.connections.len());
        }
        removed
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close every tracked connection. Entries are removed by the read loops
    /// once the clients acknowledge.
    pub fn close_all(&self, code: CloseCode, reason: &str) {
        let _ = self.closing.set((code, reason.to_string()));
        tracing::info!(connections = self.connections.len(), code = %code, "Closing all client connections");
        for entry in self.connections.iter() {
            entry.value().close(code, reason);
        }
    }
}
