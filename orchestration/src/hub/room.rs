//! Room registry — which live connections belong to which session.
//!
//! Process-local state behind an ordinary mutex; a room only needs to be
//! consistent within the process serving its sockets.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifier for one live connection.
pub type ConnId = u64;

/// Maps session ids to the set of connections in their room.
#[derive(Default)]
pub struct RoomRegistry {
    next_conn: AtomicU64,
    rooms: Mutex<HashMap<String, HashSet<ConnId>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for a new connection.
    pub fn register(&self) -> ConnId {
        self.next_conn.fetch_add(1, Ordering::Relaxed)
    }

    /// Add a connection to a session room. Idempotent.
    pub fn join(&self, session_id: &str, conn: ConnId) {
        let mut rooms = self.rooms.lock().expect("rooms lock");
        rooms.entry(session_id.to_string()).or_default().insert(conn);
    }

    /// Remove a connection from one room.
    pub fn leave(&self, session_id: &str, conn: ConnId) {
        let mut rooms = self.rooms.lock().expect("rooms lock");
        if let Some(members) = rooms.get_mut(session_id) {
            members.remove(&conn);
            if members.is_empty() {
                rooms.remove(session_id);
            }
        }
    }

    /// Remove a connection from every room it joined.
    pub fn leave_all(&self, conn: ConnId) {
        let mut rooms = self.rooms.lock().expect("rooms lock");
        rooms.retain(|_, members| {
            members.remove(&conn);
            !members.is_empty()
        });
    }

    /// Number of connections currently in a room.
    pub fn occupancy(&self, session_id: &str) -> usize {
        let rooms = self.rooms.lock().expect("rooms lock");
        rooms.get(session_id).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_occupancy() {
        let registry = RoomRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a, b);

        registry.join("s-1", a);
        registry.join("s-1", b);
        registry.join("s-1", b); // idempotent
        assert_eq!(registry.occupancy("s-1"), 2);
    }

    #[test]
    fn test_leave() {
        let registry = RoomRegistry::new();
        let a = registry.register();
        registry.join("s-1", a);
        registry.leave("s-1", a);
        assert_eq!(registry.occupancy("s-1"), 0);
    }

    #[test]
    fn test_leave_all() {
        let registry = RoomRegistry::new();
        let a = registry.register();
        registry.join("s-1", a);
        registry.join("s-2", a);
        registry.leave_all(a);
        assert_eq!(registry.occupancy("s-1"), 0);
        assert_eq!(registry.occupancy("s-2"), 0);
    }
}
