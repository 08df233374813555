//! In-memory session table for development and testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use sessionstore_core::session::{
    RowUpdate, SessionId, SessionRow, SessionTable, TableError, TableResult,
};

use crate::config::DEFAULT_TABLE;

/// In-memory session table.
///
/// Rows live in a `HashMap` behind `Arc<RwLock<_>>`, so clones share the same
/// rows. Data is lost when the last clone is dropped. Mutating calls are
/// counted, and can be made to fail, so tests can observe database writes.
#[derive(Debug, Clone)]
pub struct InMemorySessionTable {
    name: Arc<str>,
    rows: Arc<RwLock<HashMap<SessionId, SessionRow>>>,
    writes: Arc<AtomicU64>,
    failing_writes: Arc<AtomicU64>,
}

impl Default for InMemorySessionTable {
    fn default() -> Self {
        Self {
            name: Arc::from(DEFAULT_TABLE),
            rows: Arc::default(),
            writes: Arc::default(),
            failing_writes: Arc::default(),
        }
    }
}

impl InMemorySessionTable {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.name = Arc::from(name.into());
        self
    }

    /// Number of mutating calls that reached the table.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `n` mutating calls fail with `ConnectionFailed`.
    pub fn fail_next_writes(&self, n: u64) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    fn record_write(&self) -> TableResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match failing {
            Ok(_) => Err(TableError::ConnectionFailed(
                "injected write failure".to_string(),
            )),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl SessionTable for InMemorySessionTable {
    fn table_name(&self) -> &str {
        &self.name
    }

    async fn sync(&self) -> TableResult<()> {
        Ok(())
    }

    async fn find_one(&self, sid: &SessionId) -> TableResult<Option<SessionRow>> {
        let rows = self.rows.read().await;
        Ok(rows.get(sid).cloned())
    }

    async fn find_or_create(&self, defaults: &SessionRow) -> TableResult<(SessionRow, bool)> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.get(&defaults.sid) {
            return Ok((existing.clone(), false));
        }

        self.record_write()?;
        rows.insert(defaults.sid.clone(), defaults.clone());
        Ok((defaults.clone(), true))
    }

    async fn update(&self, sid: &SessionId, update: &RowUpdate) -> TableResult<u64> {
        self.record_write()?;
        let mut rows = self.rows.write().await;
        match rows.get_mut(sid) {
            Some(row) => {
                update.apply_to(row);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn destroy(&self, sid: &SessionId) -> TableResult<u64> {
        self.record_write()?;
        let mut rows = self.rows.write().await;
        Ok(rows.remove(sid).map_or(0, |_| 1))
    }

    async fn count(&self) -> TableResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows.len() as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> TableResult<u64> {
        self.record_write()?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| row.expires >= now);
        Ok((before - rows.len()) as u64)
    }
}
