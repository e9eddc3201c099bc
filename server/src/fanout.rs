//! Event router: delivers an event payload to a resolved set of recipients.
//!
//! Delivery is presence-gated and best-effort. A recipient without a live
//! connection is silently skipped; a push that fails (closed channel — the
//! connection's writer task is gone) is logged, triggers the implicit
//! unregister for that handle, and never affects the remaining recipients
//! or the producer that emitted the event.
//!
//! Pushes are plain channel sends: each connection's writer task owns the
//! actual socket write, so a slow recipient only delays itself.

use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::Value;

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomChannels;
use crate::ws::{protocol, ConnectionSender};

#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomChannels>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomChannels>) -> Self {
        Self { registry, rooms }
    }

    /// Push `(event, data)` to one user's live connection. Returns whether
    /// the push was handed to the connection — a logging signal, not a
    /// durability guarantee. Callers must not retry on `false`.
    pub fn send_to_user(&self, user_id: &str, event: &str, data: &Value) -> bool {
        let Some(tx) = self.registry.lookup(user_id) else {
            tracing::debug!(
                user_id = %user_id,
                event = %event,
                "Recipient not connected, event dropped"
            );
            return false;
        };

        self.push(user_id, &tx, protocol::event_frame(event, data))
    }

    /// Push `(event, data)` to every connection subscribed to a room
    /// channel. Returns the number of pushes delivered.
    pub fn send_to_room(&self, room_id: &str, event: &str, data: &Value) -> usize {
        let frame = protocol::event_frame(event, data);
        let mut delivered = 0;

        for user_id in self.rooms.subscribers(room_id) {
            // Resolve through the registry so a superseded connection is
            // never reached via a stale subscription.
            if let Some(tx) = self.registry.lookup(&user_id) {
                if self.push(&user_id, &tx, frame.clone()) {
                    delivered += 1;
                }
            }
        }

        tracing::debug!(
            room_id = %room_id,
            event = %event,
            delivered = delivered,
            "Room push complete"
        );
        delivered
    }

    /// Push `(event, data)` to every currently connected user.
    pub fn broadcast(&self, event: &str, data: &Value) -> usize {
        let frame = protocol::event_frame(event, data);
        let mut delivered = 0;

        for (user_id, tx) in self.registry.snapshot() {
            if self.push(&user_id, &tx, frame.clone()) {
                delivered += 1;
            }
        }

        tracing::debug!(
            event = %event,
            delivered = delivered,
            "Broadcast complete"
        );
        delivered
    }

    /// Single-recipient push with failure containment. A closed channel
    /// means the connection is dead — treat it as an implicit disconnect.
    fn push(&self, user_id: &str, tx: &ConnectionSender, frame: Message) -> bool {
        if tx.send(frame).is_err() {
            tracing::warn!(
                user_id = %user_id,
                "Push to closed connection, unregistering"
            );
            self.registry.unregister(user_id, tx);
            return false;
        }
        true
    }
}
