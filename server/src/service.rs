//! The Record → Derive → Dispatch pipeline behind `emit_activity`.
//!
//! Producers (grading, submission handling, assignment creation) call
//! `emit_activity` and get back control as soon as the durable write has
//! succeeded; derivation and delivery run in a detached task. Within one
//! activity, recording happens-before derivation happens-before dispatch.
//! Across activities there is no ordering guarantee.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::activity::{ActivityRecord, ActivityRecorder, ActivityType};
use crate::db::DbPool;
use crate::error::StorageError;
use crate::fanout::EventRouter;
use crate::notify::NotificationDeriver;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomChannels;
use crate::roster::EnrollmentStore;

/// Observability snapshot for health/monitoring endpoints.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub connected_count: usize,
    pub active_rooms: usize,
}

#[derive(Clone)]
pub struct RealtimeService {
    recorder: ActivityRecorder,
    deriver: Arc<NotificationDeriver>,
    router: EventRouter,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomChannels>,
}

impl RealtimeService {
    pub fn new(
        db: DbPool,
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomChannels>,
        roster: Arc<dyn EnrollmentStore>,
    ) -> Self {
        Self {
            recorder: ActivityRecorder::new(db),
            deriver: Arc::new(NotificationDeriver::new(roster)),
            router: EventRouter::new(registry.clone(), rooms.clone()),
            registry,
            rooms,
        }
    }

    /// Direct access to the router for producers that push raw events
    /// (room pushes, broadcasts) without going through the activity log.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Producer entry point. Returns once the activity is durably recorded;
    /// a `StorageError` means nothing was written and the producer decides
    /// whether to drop or retry. Notification fan-out is fire-and-forget
    /// relative to the caller.
    pub async fn emit_activity(
        &self,
        user_id: &str,
        kind: ActivityType,
        payload: Value,
    ) -> Result<ActivityRecord, StorageError> {
        let record = self.recorder.record(user_id, kind, payload).await?;

        let service = self.clone();
        let dispatched = record.clone();
        tokio::spawn(async move {
            service.derive_and_dispatch(dispatched).await;
        });

        Ok(record)
    }

    async fn derive_and_dispatch(&self, record: ActivityRecord) {
        let notifications = self.deriver.derive(&record).await;

        for mut notification in notifications {
            let data = match serde_json::to_value(&notification) {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(
                        activity_id = %record.id,
                        error = %e,
                        "Failed to serialize notification"
                    );
                    continue;
                }
            };

            notification.delivered =
                self.router
                    .send_to_user(&notification.recipient_user_id, "notification", &data);

            tracing::debug!(
                activity_id = %record.id,
                recipient = %notification.recipient_user_id,
                delivered = notification.delivered,
                "Notification dispatched"
            );
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            connected_count: self.registry.count(),
            active_rooms: self.rooms.active_rooms(),
        }
    }
}
