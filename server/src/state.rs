use std::sync::Arc;

use crate::db::DbPool;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomChannels;
use crate::roster::SqliteEnrollmentStore;
use crate::service::RealtimeService;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live WebSocket connection per authenticated user
    pub registry: Arc<ConnectionRegistry>,
    /// Transport-level room channel subscriptions
    pub rooms: Arc<RoomChannels>,
    /// Record → Derive → Dispatch pipeline
    pub service: RealtimeService,
}

impl AppState {
    pub fn new(db: DbPool) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomChannels::new());
        let roster = Arc::new(SqliteEnrollmentStore::new(db.clone()));
        let service = RealtimeService::new(db.clone(), registry.clone(), rooms.clone(), roster);

        Self {
            db,
            registry,
            rooms,
            service,
        }
    }
}
