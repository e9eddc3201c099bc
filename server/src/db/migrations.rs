use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: activity log + enrollment mirror

-- Append-only activity log. This service never updates or deletes rows;
-- history/analytics views read them elsewhere.
CREATE TABLE activities (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    type TEXT NOT NULL,
    payload TEXT NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE INDEX idx_activities_user ON activities(user_id);
CREATE INDEX idx_activities_type ON activities(type);

-- Class roster, synced from the platform's enrollment records.
-- Read-only from this service's point of view.
CREATE TABLE classes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE enrollments (
    class_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (class_id, user_id),
    FOREIGN KEY (class_id) REFERENCES classes(id)
);

CREATE INDEX idx_enrollments_class ON enrollments(class_id);
",
    )])
}
