use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub const MEMORY_URL: &str = ":memory:";

pub fn open_db(database_url: &str) -> anyhow::Result<Connection> {
    let conn = if database_url == MEMORY_URL {
        Connection::open_in_memory()?
    } else {
        let path = Path::new(database_url);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Connection::open(path)?
    };
    conn.busy_timeout(Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records(
            id TEXT PRIMARY KEY,
            name TEXT,
            email TEXT,
            course TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    // Lookups by name+email back the authenticate endpoint.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_name_email ON records(name, email)",
        [],
    )?;

    Ok(conn)
}
