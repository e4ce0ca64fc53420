use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::websocket::events::ChatEvent;

/// Identifies one live socket within a user's connection set.
pub type ConnectionId = u64;

/// In-memory registry of live chat connections, keyed by user id.
///
/// Each socket is represented by the sending half of an unbounded
/// channel; the socket task drains the receiving half onto the wire.
/// All routing state lives here and nowhere else, so losing the
/// process only costs connectivity, never messages.
pub struct ConnectionManager {
    connections: DashMap<Uuid, HashMap<ConnectionId, UnboundedSender<ChatEvent>>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a socket under `user_id` and hand back its id for the
    /// matching `disconnect` call.
    pub fn connect(&self, user_id: Uuid, sender: UnboundedSender<ChatEvent>) -> ConnectionId {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entry = self.connections.entry(user_id).or_default();
        entry.insert(conn_id, sender);
        info!(
            %user_id,
            conn_id,
            total_connections = entry.len(),
            "websocket connected"
        );
        conn_id
    }

    /// Remove one socket. Idempotent: unknown ids are a no-op. When the
    /// last socket goes, the user entry is dropped and the user is
    /// offline.
    pub fn disconnect(&self, user_id: Uuid, conn_id: ConnectionId) {
        let mut removed = false;
        if let dashmap::mapref::entry::Entry::Occupied(mut entry) =
            self.connections.entry(user_id)
        {
            removed = entry.get_mut().remove(&conn_id).is_some();
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        if removed {
            info!(%user_id, conn_id, "websocket disconnected");
        }
    }

    /// Deliver `event` to every live socket owned by `user_id`.
    /// Best-effort: a socket whose channel is gone is pruned, and one
    /// dead socket never blocks delivery to the others. Sending to an
    /// offline user is a no-op.
    pub fn send_to_user(&self, event: &ChatEvent, user_id: Uuid) {
        // Snapshot the senders so a concurrent connect/disconnect can't
        // invalidate the iteration.
        let targets: Vec<(ConnectionId, UnboundedSender<ChatEvent>)> = match self
            .connections
            .get(&user_id)
        {
            Some(entry) => entry.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
            None => {
                debug!(%user_id, "push skipped, user offline");
                return;
            }
        };

        for (conn_id, tx) in targets {
            if tx.send(event.clone()).is_err() {
                warn!(%user_id, conn_id, "websocket send failed, dropping connection");
                self.disconnect(user_id, conn_id);
            }
        }
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.connections
            .get(&user_id)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    pub fn online_users(&self) -> HashSet<Uuid> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
