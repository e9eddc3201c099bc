pub mod migrations;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Shared handle to the SQLite connection. rusqlite is synchronous, so all
/// queries go through Arc<Mutex> + tokio::task::spawn_blocking to keep the
/// async runtime unblocked.
pub type DbPool = Arc<Mutex<Connection>>;

/// Open (or create) the activity-log database under `data_dir` and bring
/// the schema up to date. WAL mode keeps concurrent reads cheap while the
/// recorder appends.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("classpulse.db");
    let mut conn = Connection::open(&db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations::migrations().to_latest(&mut conn)?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}
