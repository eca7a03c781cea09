//! SQLite-backed record store implementation.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params_from_iter, Connection};

use super::{columns, row_values, RecordStore, SinkError};
use crate::record::Record;

/// SQLite-backed record store. Each append is one transaction.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open the database file, creating it and the table if needed.
    pub fn new(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite record store (useful for testing).
    pub fn in_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SinkError> {
        let column_defs = columns()
            .iter()
            .map(|c| format!("{} TEXT", c))
            .collect::<Vec<_>>()
            .join(",\n                ");
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {}
            );

            CREATE INDEX IF NOT EXISTS idx_records_registration ON records(registration_number);
            CREATE INDEX IF NOT EXISTS idx_records_council ON records(council_code);
            "#,
            column_defs
        ))?;
        Ok(())
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SinkError> {
        self.conn
            .lock()
            .map_err(|_| SinkError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    /// Registration numbers in insertion order.
    pub fn registration_numbers(&self) -> Result<Vec<String>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT registration_number FROM records ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn append(&self, records: &[Record]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let columns = columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO records ({}) VALUES ({})",
            columns.join(", "),
            placeholders
        );

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                stmt.execute(params_from_iter(row_values(record)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<u64, SinkError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
