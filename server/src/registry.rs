//! Connection registry: authoritative, process-local mapping from a user id
//! to their one live WebSocket connection.
//!
//! A user has at most one addressable connection at a time — a reconnect
//! supersedes the prior mapping. The registry never closes sockets itself;
//! `register` hands the superseded sender back to the transport layer, which
//! decides what to do with the stale connection.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::ws::ConnectionSender;

/// One live, authenticated connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub tx: ConnectionSender,
    pub connected_at: DateTime<Utc>,
}

/// Registry of live connections. Owned and injectable — shared via Arc in
/// AppState, never a global. All operations are single DashMap entry ops,
/// so concurrent register/unregister/lookup callers never observe a
/// half-updated mapping, and nothing here blocks on I/O.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: DashMap<String, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Store (or overwrite) the mapping for `user_id`. Total — no error
    /// conditions. Returns the superseded sender, if any, so the caller can
    /// close the stale duplicate.
    pub fn register(&self, user_id: &str, tx: ConnectionSender) -> Option<ConnectionSender> {
        let previous = self.conns.insert(
            user_id.to_string(),
            ConnectionEntry {
                tx,
                connected_at: Utc::now(),
            },
        );

        tracing::debug!(
            user_id = %user_id,
            superseded = previous.is_some(),
            "Connection registered"
        );

        previous.map(|entry| entry.tx)
    }

    /// Remove the mapping for `user_id`, but only if it still points at this
    /// exact sender. Guards against the race where a stale disconnect event
    /// arrives after a newer connection has already overwritten the mapping.
    /// No-op, not an error, if the mapping is absent or points elsewhere.
    /// Returns whether a mapping was actually removed, so the transport can
    /// tell a real disconnect from a stale event for a superseded handle.
    pub fn unregister(&self, user_id: &str, tx: &ConnectionSender) -> bool {
        let removed = self
            .conns
            .remove_if(user_id, |_, entry| entry.tx.same_channel(tx))
            .is_some();

        tracing::debug!(
            user_id = %user_id,
            removed = removed,
            "Connection unregistered"
        );

        removed
    }

    /// Pure read: the live sender for `user_id`, if connected.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionSender> {
        self.conns.get(user_id).map(|entry| entry.tx.clone())
    }

    /// Number of currently tracked live connections.
    pub fn count(&self) -> usize {
        self.conns.len()
    }

    /// Snapshot of all live connections (broadcast path). A snapshot rather
    /// than an iterator: the caller may unregister dead entries while
    /// pushing, which must not happen under the map's shard locks.
    pub fn snapshot(&self) -> Vec<(String, ConnectionSender)> {
        self.conns
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().tx.clone()))
            .collect()
    }
}
