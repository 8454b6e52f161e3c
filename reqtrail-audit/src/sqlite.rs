//! SQLite audit table
//!
//! Blocking `rusqlite` calls run on the tokio blocking pool. Timestamps are
//! stored as fixed-width RFC 3339 UTC text so that `created_at` compares
//! correctly as a string.

use crate::store::{AuditRow, AuditRowUpdate, AuditStore, NewAuditRow, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use reqtrail_config::is_sql_identifier;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Audit store backed by a SQLite table
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<str>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::with_connection(conn, table)
    }

    /// Private in-memory database
    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    /// Wrap an existing connection
    pub fn with_connection(conn: Connection, table: &str) -> Result<Self, StoreError> {
        if !is_sql_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: Arc::from(table),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the audit table and its `created_at` index if missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ip TEXT NOT NULL,
                    user_id TEXT NULL,
                    method TEXT NOT NULL,
                    uri TEXT NOT NULL,
                    body TEXT NOT NULL,
                    request_size INTEGER NOT NULL,
                    files TEXT NOT NULL,
                    status INTEGER NULL,
                    duration REAL NULL,
                    response TEXT NULL,
                    response_size INTEGER NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS {table}_created_at_index ON {table} (created_at);"
            ))?;
            tracing::debug!(table = %table, "Audit table migrated");
            Ok(())
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {text:?}: {e}")))
}

fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_int<T: TryFrom<i64>>(column: &str, n: i64) -> Result<T, StoreError> {
    T::try_from(n).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {n}")))
}

struct RawRow {
    id: i64,
    ip: String,
    method: String,
    uri: String,
    body: String,
    request_size: i64,
    files: String,
    user_id: Option<String>,
    status: Option<i64>,
    duration: Option<f64>,
    response: Option<String>,
    response_size: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    const COLUMNS: &'static str = "id, ip, method, uri, body, request_size, files, user_id, \
         status, duration, response, response_size, created_at, updated_at";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            ip: row.get(1)?,
            method: row.get(2)?,
            uri: row.get(3)?,
            body: row.get(4)?,
            request_size: row.get(5)?,
            files: row.get(6)?,
            user_id: row.get(7)?,
            status: row.get(8)?,
            duration: row.get(9)?,
            response: row.get(10)?,
            response_size: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_row(self) -> Result<AuditRow, StoreError> {
        Ok(AuditRow {
            id: self.id,
            ip: self.ip,
            method: self.method,
            uri: self.uri,
            body: self.body,
            request_size: from_sql_int("request_size", self.request_size)?,
            files: self.files,
            user_id: self.user_id,
            status: self
                .status
                .map(|s| from_sql_int("status", s))
                .transpose()?,
            duration: self.duration,
            response: self.response,
            response_size: self
                .response_size
                .map(|s| from_sql_int("response_size", s))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn insert(&self, row: NewAuditRow) -> Result<i64, StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (ip, method, uri, body, request_size, files, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    row.ip,
                    row.method,
                    row.uri,
                    row.body,
                    to_sql_int(row.request_size),
                    row.files,
                    timestamp(row.created_at),
                    timestamp(row.updated_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update(&self, id: i64, update: AuditRowUpdate) -> Result<bool, StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE {table} SET user_id = ?, status = ?, duration = ?, response = ?,
                     response_size = ?, updated_at = ? WHERE id = ?"
                ),
                rusqlite::params![
                    update.user_id,
                    i64::from(update.status),
                    update.duration,
                    update.response,
                    to_sql_int(update.response_size),
                    timestamp(update.updated_at),
                    id,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            let deleted = conn.execute(
                &format!("DELETE FROM {table} WHERE created_at < ?"),
                [timestamp(cutoff)],
            )?;
            Ok(deleted)
        })
        .await
    }

    async fn find(&self, id: i64) -> Result<Option<AuditRow>, StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM {table} WHERE id = ?", RawRow::COLUMNS),
                    [id],
                    RawRow::read,
                )
                .optional()?;
            raw.map(RawRow::into_row).transpose()
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let table = self.table.clone();
        self.blocking(move |conn| {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            from_sql_int("count", n)
        })
        .await
    }
}
