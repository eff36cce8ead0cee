//! SQLite implementation of the data store.

use super::{DataStore, SqlParam};
use crate::error::{DashResult, DashboardError};
use crate::models::Table;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::{Number, Value};
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database read-only.
    ///
    /// A missing file is an error instead of a freshly created empty store.
    pub fn open(path: &Path) -> DashResult<Self> {
        if !path.exists() {
            return Err(DashboardError::Store(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        debug!("Opened database at {}", path.display());

        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl DataStore for SqliteStore {
    fn query_scalar(&self, sql: &str, params: &[SqlParam]) -> DashResult<Option<f64>> {
        debug!("Aggregate query with {} params", params.len());
        let value = self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| {
                row.get::<_, Option<f64>>(0)
            })?;
        Ok(value)
    }

    fn query_table(&self, sql: &str) -> DashResult<Table> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(cell_to_json))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Loaded {} rows x {} columns", rows.len(), column_count);
        Ok(Table { columns, rows })
    }
}

fn cell_to_json(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}
