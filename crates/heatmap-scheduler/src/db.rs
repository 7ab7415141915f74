use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Open the schedule database with a bounded busy timeout.
pub fn open(path: &str, busy_timeout: Duration) -> Result<Connection> {
    info!(path, "opening SQLite database");
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Initialise the scheduler schema in `conn`. Safe to call on every startup.
///
/// `heatmap_site` is owned by the site admin application; it is created here
/// only so a fresh local database is usable.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS monthly_adding_site_tables (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            apply_on      TEXT    NOT NULL UNIQUE,   -- YYYY-MM-DD
            list_sites    TEXT    NOT NULL,          -- JSON array of site ids
            is_added      INTEGER NOT NULL DEFAULT 0,
            log           TEXT,
            failed_sites  TEXT    NOT NULL DEFAULT '[]',
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS heatmap_site (
            site_id     INTEGER PRIMARY KEY,
            status      INTEGER NOT NULL DEFAULT 1,
            is_deleted  INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;
    Ok(())
}
