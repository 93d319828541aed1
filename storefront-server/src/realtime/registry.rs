//! Connection and room registry
//!
//! Explicit registry object owned by the broker and injected wherever
//! membership is needed — never ambient global state, so room membership
//! stays inspectable and testable without a live socket.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::transport::Transport;

/// Registry of open connections and their room memberships.
///
/// Membership is ephemeral and connection-scoped: removing a connection
/// implicitly leaves every room it joined.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Arc<dyn Transport>>,
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection, returning its id.
    pub fn register(&self, transport: Arc<dyn Transport>) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(id, transport);
        id
    }

    /// Join a named room. Unknown connection ids are ignored (the
    /// connection raced its own disconnect).
    pub fn join(&self, connection_id: Uuid, room: &str) {
        if !self.connections.contains_key(&connection_id) {
            return;
        }
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        tracing::debug!(%connection_id, room, "Connection joined room");
    }

    /// Remove a connection and leave all of its rooms.
    pub fn remove(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
        self.rooms.retain(|_, members| {
            members.remove(&connection_id);
            !members.is_empty()
        });
    }

    /// Transports currently joined to `room`.
    pub fn members(&self, room: &str) -> Vec<(Uuid, Arc<dyn Transport>)> {
        let Some(members) = self.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| self.connections.get(id).map(|t| (*id, t.clone())))
            .collect()
    }

    /// Every open connection.
    pub fn all(&self) -> Vec<(Uuid, Arc<dyn Transport>)> {
        self.connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Live connection count, for the introspection surface.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Membership count of one room.
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::transport::memory_pair;

    #[test]
    fn join_and_implicit_leave() {
        let registry = ConnectionRegistry::new();
        let (t1, _p1) = memory_pair();
        let (t2, _p2) = memory_pair();

        let a = registry.register(t1);
        let b = registry.register(t2);
        registry.join(a, "order-1");
        registry.join(a, "customers");
        registry.join(b, "customers");

        assert_eq!(registry.connection_count(), 2);
        assert_eq!(registry.room_size("order-1"), 1);
        assert_eq!(registry.room_size("customers"), 2);

        registry.remove(a);
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.room_size("order-1"), 0);
        assert_eq!(registry.room_size("customers"), 1);
    }

    #[test]
    fn join_after_disconnect_is_ignored() {
        let registry = ConnectionRegistry::new();
        let (t1, _p1) = memory_pair();
        let a = registry.register(t1);
        registry.remove(a);

        registry.join(a, "order-1");
        assert_eq!(registry.room_size("order-1"), 0);
    }
}
