//! Activity recording: every event a producer emits becomes exactly one
//! immutable row in the activity log, whether or not anything is derived
//! from it afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::StorageError;

/// Activity types the platform emits. Open set: producers may introduce new
/// types before this service learns about them, and those are still
/// recorded — they just derive no notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    AssignmentSubmitted,
    GradePosted,
    NewAssignment,
    QuizCompleted,
    TutorInteraction,
    Other(String),
}

impl ActivityType {
    /// Total — unrecognized strings map to `Other`, never an error.
    pub fn from_str(s: &str) -> Self {
        match s {
            "assignment_submitted" => Self::AssignmentSubmitted,
            "grade_posted" => Self::GradePosted,
            "new_assignment" => Self::NewAssignment,
            "quiz_completed" => Self::QuizCompleted,
            "tutor_interaction" => Self::TutorInteraction,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AssignmentSubmitted => "assignment_submitted",
            Self::GradePosted => "grade_posted",
            Self::NewAssignment => "new_assignment",
            Self::QuizCompleted => "quiz_completed",
            Self::TutorInteraction => "tutor_interaction",
            Self::Other(s) => s,
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One immutable fact about something a user did.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Durably appends activity records. No internal retries: without an
/// idempotency key a retry could write duplicate records, so the producer
/// owns retry/drop policy on `StorageError`.
#[derive(Clone)]
pub struct ActivityRecorder {
    db: DbPool,
}

impl ActivityRecorder {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Persist one activity. Returns the full record on success so the
    /// fan-out path can work from the in-memory payload without a re-read.
    pub async fn record(
        &self,
        user_id: &str,
        kind: ActivityType,
        payload: Value,
    ) -> Result<ActivityRecord, StorageError> {
        let record = ActivityRecord {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            kind,
            payload,
            occurred_at: Utc::now(),
        };

        let db = self.db.clone();
        let row = record.clone();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| StorageError::Unavailable("database lock poisoned".to_string()))?;
            conn.execute(
                "INSERT INTO activities (id, user_id, type, payload, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    row.id,
                    row.user_id,
                    row.kind.as_str(),
                    row.payload.to_string(),
                    row.occurred_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            Ok::<_, StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("task join: {}", e)))??;

        tracing::debug!(
            activity_id = %record.id,
            user_id = %record.user_id,
            activity_type = %record.kind.as_str(),
            "Activity recorded"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn test_db() -> DbPool {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::migrations().to_latest(&mut conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[test]
    fn activity_type_round_trips() {
        for name in [
            "assignment_submitted",
            "grade_posted",
            "new_assignment",
            "quiz_completed",
            "tutor_interaction",
        ] {
            assert_eq!(ActivityType::from_str(name).as_str(), name);
        }
    }

    #[test]
    fn unrecognized_type_is_preserved_not_rejected() {
        let kind = ActivityType::from_str("badge_earned");
        assert_eq!(kind, ActivityType::Other("badge_earned".to_string()));
        assert_eq!(kind.as_str(), "badge_earned");
    }

    #[tokio::test]
    async fn record_persists_exactly_one_row() {
        let db = test_db();
        let recorder = ActivityRecorder::new(db.clone());

        let record = recorder
            .record(
                "s1",
                ActivityType::GradePosted,
                serde_json::json!({"studentId": "s1", "grade": 92}),
            )
            .await
            .unwrap();

        let conn = db.lock().unwrap();
        let (count, stored_type): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(type) FROM activities WHERE id = ?1",
                [&record.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(stored_type, "grade_posted");
    }

    #[tokio::test]
    async fn unknown_type_is_still_recorded() {
        let db = test_db();
        let recorder = ActivityRecorder::new(db.clone());

        recorder
            .record(
                "u1",
                ActivityType::from_str("badge_earned"),
                serde_json::json!({}),
            )
            .await
            .unwrap();

        let conn = db.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM activities WHERE type = 'badge_earned'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
