//! Audit table storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One row of the audit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub id: i64,
    pub ip: String,
    pub method: String,
    pub uri: String,
    pub body: String,
    pub request_size: usize,
    /// JSON array of uploaded file names
    pub files: String,
    pub user_id: Option<String>,
    pub status: Option<u16>,
    pub duration: Option<f64>,
    pub response: Option<String>,
    pub response_size: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns written when the request is logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditRow {
    pub ip: String,
    pub method: String,
    pub uri: String,
    pub body: String,
    pub request_size: usize,
    pub files: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Columns written when the response is logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRowUpdate {
    pub user_id: Option<String>,
    pub status: u16,
    pub duration: f64,
    pub response: String,
    pub response_size: usize,
    pub updated_at: DateTime<Utc>,
}

impl AuditRow {
    fn from_new(id: i64, row: NewAuditRow) -> Self {
        Self {
            id,
            ip: row.ip,
            method: row.method,
            uri: row.uri,
            body: row.body,
            request_size: row.request_size,
            files: row.files,
            user_id: None,
            status: None,
            duration: None,
            response: None,
            response_size: None,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn apply(&mut self, update: AuditRowUpdate) {
        self.user_id = update.user_id;
        self.status = Some(update.status);
        self.duration = Some(update.duration);
        self.response = Some(update.response);
        self.response_size = Some(update.response_size);
        self.updated_at = update.updated_at;
    }

    /// Whether the response half of the row has been written
    pub fn is_complete(&self) -> bool {
        self.status.is_some()
    }
}

/// Audit store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Store error: {0}")]
    Other(String),
}

/// Relational storage for audit rows
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Insert a request-only row and return its id
    async fn insert(&self, row: NewAuditRow) -> Result<i64, StoreError>;

    /// Write the response columns of row `id`. Returns `false` when no such row exists.
    async fn update(&self, id: i64, update: AuditRowUpdate) -> Result<bool, StoreError>;

    /// Delete rows created strictly before `cutoff`, returning how many went
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Fetch a row by id
    async fn find(&self, id: i64) -> Result<Option<AuditRow>, StoreError>;

    /// Number of rows
    async fn count(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    rows: Vec<AuditRow>,
}

/// In-memory audit store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows in insertion order
    pub async fn rows(&self) -> Vec<AuditRow> {
        self.state.lock().await.rows.clone()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert(&self, row: NewAuditRow) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        let id = state.last_id;
        state.rows.push(AuditRow::from_new(id, row));
        Ok(id)
    }

    async fn update(&self, id: i64, update: AuditRowUpdate) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.rows.iter_mut().find(|row| row.id == id) {
            Some(row) => {
                row.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.rows.len();
        state.rows.retain(|row| row.created_at >= cutoff);
        Ok(before - state.rows.len())
    }

    async fn find(&self, id: i64) -> Result<Option<AuditRow>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().await.rows.len())
    }
}

#[async_trait]
impl<S: AuditStore + ?Sized> AuditStore for std::sync::Arc<S> {
    async fn insert(&self, row: NewAuditRow) -> Result<i64, StoreError> {
        (**self).insert(row).await
    }

    async fn update(&self, id: i64, update: AuditRowUpdate) -> Result<bool, StoreError> {
        (**self).update(id, update).await
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).delete_created_before(cutoff).await
    }

    async fn find(&self, id: i64) -> Result<Option<AuditRow>, StoreError> {
        (**self).find(id).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }
}
