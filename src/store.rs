use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::db;

// Max ids per `IN (...)` clause.
const DELETE_CHUNK: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open store: {0}")]
    Open(#[source] anyhow::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("store is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

impl RecordFields {
    pub fn new(name: &str, email: &str, course: &str) -> Self {
        RecordFields {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            course: Some(course.to_string()),
        }
    }

    // Unknown columns are dropped; cell values are cast to text.
    pub fn from_row(row: &Map<String, Value>) -> Self {
        RecordFields {
            name: row.get("name").and_then(cell_text),
            email: row.get("email").and_then(cell_text),
            course: row.get("course").and_then(cell_text),
        }
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    return Some(format!("{}", f as i64));
                }
            }
            Some(n.to_string())
        }
        // Nested values never come out of the decoder; keep their JSON text.
        other => Some(other.to_string()),
    }
}

pub trait RecordStore: Send + Sync {
    fn insert(&self, fields: &RecordFields) -> Result<Record>;

    fn find_all(&self) -> Result<Vec<Record>>;

    fn find_one_exact(&self, name: &str, email: &str) -> Result<Option<Record>>;

    fn update_by_id(&self, id: &str, fields: &RecordFields) -> Result<Option<Record>>;

    fn delete_by_id(&self, id: &str) -> Result<Option<Record>>;

    // Unknown ids are skipped.
    fn delete_by_id_set(&self, ids: &[String]) -> Result<usize>;

    fn count(&self) -> Result<usize>;

    fn close(&self) -> Result<()>;
}

pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    pub fn open(database_url: &str) -> Result<Self> {
        let conn = db::open_db(database_url).map_err(StoreError::Open)?;
        Ok(SqliteStore {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(f(conn)?)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        course: row.get(3)?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<Record>> {
    conn.query_row(
        "SELECT id, name, email, course FROM records WHERE id = ?",
        [id],
        record_from_row,
    )
    .optional()
}

impl RecordStore for SqliteStore {
    fn insert(&self, fields: &RecordFields) -> Result<Record> {
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records(id, name, email, course, created_at)
                 VALUES(?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
                (
                    &id,
                    fields.name.as_deref(),
                    fields.email.as_deref(),
                    fields.course.as_deref(),
                ),
            )
        })?;
        Ok(Record {
            id,
            name: fields.name.clone(),
            email: fields.email.clone(),
            course: fields.course.clone(),
        })
    }

    fn find_all(&self) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, email, course FROM records ORDER BY rowid")?;
            let rows = stmt
                .query_map([], record_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    fn find_one_exact(&self, name: &str, email: &str) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, course
                 FROM records
                 WHERE name = ? AND email = ?
                 ORDER BY rowid
                 LIMIT 1",
                [name, email],
                record_from_row,
            )
            .optional()
        })
    }

    fn update_by_id(&self, id: &str, fields: &RecordFields) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE records
                 SET name = ?, email = ?, course = ?,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
                 WHERE id = ?",
                (
                    fields.name.as_deref(),
                    fields.email.as_deref(),
                    fields.course.as_deref(),
                    id,
                ),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_by_id(conn, id)
        })
    }

    fn delete_by_id(&self, id: &str) -> Result<Option<Record>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let Some(existing) = select_by_id(&tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM records WHERE id = ?", [id])?;
            tx.commit()?;
            Ok(Some(existing))
        })
    }

    fn delete_by_id_set(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut deleted = 0;
            for chunk in ids.chunks(DELETE_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                deleted += tx.execute(
                    &format!("DELETE FROM records WHERE id IN ({})", placeholders),
                    params_from_iter(chunk.iter()),
                )?;
            }
            tx.commit()?;
            Ok(deleted)
        })
    }

    fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
            Ok(n as usize)
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let Some(conn) = guard.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}
