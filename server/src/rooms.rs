//! Transport-level room channels.
//!
//! A connection subscribes to a room only while its user is actively viewing
//! that context (a class page, a live session). This is distinct from the
//! data-level class membership resolved from enrollment records — the
//! notification pipeline fans out per enrolled member via the registry, while
//! room pushes here reach whoever currently has the room open.

use dashmap::DashMap;
use std::collections::HashSet;

/// room_id -> set of subscribed user ids. Connection senders are resolved
/// through the registry at send time, so a superseded connection can never
/// be reached through a stale room subscription.
#[derive(Debug, Default)]
pub struct RoomChannels {
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomChannels {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Subscribe `user_id` to a room channel. Idempotent.
    pub fn subscribe(&self, room_id: &str, user_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Unsubscribe `user_id` from a room channel. Empty rooms are dropped.
    pub fn unsubscribe(&self, room_id: &str, user_id: &str) {
        let mut remove_room = false;

        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(user_id);
            if members.is_empty() {
                remove_room = true;
            }
        }

        if remove_room {
            self.rooms.remove_if(room_id, |_, members| members.is_empty());
        }
    }

    /// Drop `user_id` from every room. Called on disconnect — subscriptions
    /// are per-connection state and do not survive a reconnect.
    pub fn leave_all(&self, user_id: &str) {
        let mut empty_rooms = Vec::new();

        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(user_id);
            if entry.value().is_empty() {
                empty_rooms.push(entry.key().clone());
            }
        }

        for room_id in empty_rooms {
            self.rooms.remove_if(&room_id, |_, members| members.is_empty());
        }
    }

    /// Current subscribers of a room. Empty vec if nobody has it open.
    pub fn subscribers(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one subscriber.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}
