//! Room membership resolution: "all students in class X".
//!
//! Enrollment state is owned by the platform and only read here. The trait
//! is the collaborator seam — the deriver depends on it, not on SQLite, so
//! tests can substitute an in-memory roster.

use async_trait::async_trait;

use crate::db::DbPool;
use crate::error::{RosterError, StorageError};

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Current member user ids of a room. A room with no members resolves
    /// to `Ok` with an empty list; a room that does not exist is
    /// `RosterError::RoomNotFound`.
    async fn members_of(&self, room_id: &str) -> Result<Vec<String>, RosterError>;
}

/// Reads the `classes`/`enrollments` tables the platform sync job writes.
pub struct SqliteEnrollmentStore {
    db: DbPool,
}

impl SqliteEnrollmentStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EnrollmentStore for SqliteEnrollmentStore {
    async fn members_of(&self, room_id: &str) -> Result<Vec<String>, RosterError> {
        let db = self.db.clone();
        let room = room_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| StorageError::Unavailable("database lock poisoned".to_string()))?;

            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM classes WHERE id = ?1)",
                    [&room],
                    |row| row.get(0),
                )
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;

            if !exists {
                return Err(RosterError::RoomNotFound(room));
            }

            let mut stmt = conn
                .prepare("SELECT user_id FROM enrollments WHERE class_id = ?1")
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;

            let members: Vec<String> = stmt
                .query_map([&room], |row| row.get::<_, String>(0))
                .map_err(|e| StorageError::Unavailable(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect();

            Ok(members)
        })
        .await
        .map_err(|e| RosterError::Storage(StorageError::Unavailable(format!("task join: {}", e))))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn seeded_db() -> DbPool {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::migrations().to_latest(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO classes (id, name) VALUES ('algebra', 'Algebra I'), ('empty', 'Empty');
             INSERT INTO enrollments (class_id, user_id) VALUES
                 ('algebra', 'a'), ('algebra', 'b'), ('algebra', 'c');",
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[tokio::test]
    async fn resolves_class_members() {
        let roster = SqliteEnrollmentStore::new(seeded_db());
        let mut members = roster.members_of("algebra").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_class_is_ok_not_an_error() {
        let roster = SqliteEnrollmentStore::new(seeded_db());
        let members = roster.members_of("empty").await.unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn missing_class_is_room_not_found() {
        let roster = SqliteEnrollmentStore::new(seeded_db());
        let err = roster.members_of("nope").await.unwrap_err();
        assert!(matches!(err, RosterError::RoomNotFound(room) if room == "nope"));
    }
}
