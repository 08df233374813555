//! SQLite session table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use sessionstore_core::session::{
    ColumnValue, RowUpdate, SessionId, SessionRow, SessionTable, TableError, TableResult,
};

use super::conversions::{column_to_value, format_datetime, row_to_session};
use super::error::map_tokio_rusqlite_error;
use super::schema::TableSchema;
use crate::config::DEFAULT_TABLE;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// SQLite-backed session table.
///
/// All statements run on one `tokio_rusqlite::Connection`, which serializes
/// them on a background thread.
#[derive(Clone)]
pub struct SqliteSessionTable {
    conn: Connection,
    schema: Arc<TableSchema>,
}

impl std::fmt::Debug for SqliteSessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSessionTable")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SqliteSessionTable {
    /// Opens a file-based database. The file is created if it doesn't exist.
    ///
    /// The table itself is only created by `sync`.
    pub async fn open(path: impl AsRef<Path>) -> TableResult<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| TableError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn open_in_memory() -> TableResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| TableError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_connection(conn))
    }

    /// Wraps an existing connection using the default table name.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            schema: Arc::new(TableSchema::new(DEFAULT_TABLE)),
        }
    }

    /// Overrides the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        let extra = self.schema.extra_columns().to_vec();
        self.schema = Arc::new(TableSchema::new(name).with_extra_columns(extra));
        self
    }

    /// Declares caller-defined columns stored alongside `data` and `expires`.
    pub fn with_extra_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = Arc::new(TableSchema::new(self.schema.name()).with_extra_columns(columns));
        self
    }

    /// Rejects extra columns the table does not declare.
    fn check_columns<'a>(&self, columns: impl IntoIterator<Item = &'a String>) -> TableResult<()> {
        for column in columns {
            if !self.schema.has_column(column) {
                return Err(TableError::InvalidData(format!(
                    "unknown column '{}' for table '{}'",
                    column,
                    self.schema.name()
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionTable for SqliteSessionTable {
    fn table_name(&self) -> &str {
        self.schema.name()
    }

    async fn sync(&self) -> TableResult<()> {
        let sql = self.schema.create_table();

        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql).map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, ""))
    }

    async fn find_one(&self, sid: &SessionId) -> TableResult<Option<SessionRow>> {
        let schema = Arc::clone(&self.schema);
        let sid_str = sid.as_str().to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&schema.select_by_sid()).map_err(wrap_err)?;
                let row = stmt
                    .query_row([&sid_str], |row| row_to_session(row, schema.extra_columns()))
                    .optional()
                    .map_err(wrap_err)?;
                Ok(row)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, sid.as_str()))
    }

    async fn find_or_create(&self, defaults: &SessionRow) -> TableResult<(SessionRow, bool)> {
        self.check_columns(defaults.extra.keys())?;

        let schema = Arc::clone(&self.schema);
        let row = defaults.clone();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;

                let existing = tx
                    .query_row(&schema.select_by_sid(), [row.sid.as_str()], |r| {
                        row_to_session(r, schema.extra_columns())
                    })
                    .optional()
                    .map_err(wrap_err)?;

                if let Some(existing) = existing {
                    tx.commit().map_err(wrap_err)?;
                    return Ok((existing, false));
                }

                let mut params = vec![
                    Value::Text(row.sid.as_str().to_string()),
                    Value::Text(row.data.clone()),
                    Value::Text(format_datetime(&row.expires)),
                ];
                // Columns the row leaves out are stored as NULL.
                let mut created = row.clone();
                for column in schema.extra_columns() {
                    let value = row.extra.get(column).cloned().unwrap_or(ColumnValue::Null);
                    params.push(column_to_value(&value));
                    created.extra.insert(column.clone(), value);
                }

                tx.execute(&schema.insert(), rusqlite::params_from_iter(params))
                    .map_err(wrap_err)?;
                tx.commit().map_err(wrap_err)?;

                Ok((created, true))
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, defaults.sid.as_str()))
    }

    async fn update(&self, sid: &SessionId, update: &RowUpdate) -> TableResult<u64> {
        self.check_columns(update.extra.keys())?;

        let columns: Vec<&str> = update.extra.keys().map(String::as_str).collect();
        let sql = self.schema.update(update.data.is_some(), &columns);

        let mut params = vec![
            Value::Text(sid.as_str().to_string()),
            Value::Text(format_datetime(&update.expires)),
        ];
        if let Some(data) = &update.data {
            params.push(Value::Text(data.clone()));
        }
        params.extend(update.extra.values().map(column_to_value));

        self.conn
            .call(move |conn| {
                let rows = conn
                    .execute(&sql, rusqlite::params_from_iter(params))
                    .map_err(wrap_err)?;
                Ok(rows as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, sid.as_str()))
    }

    async fn destroy(&self, sid: &SessionId) -> TableResult<u64> {
        let sql = self.schema.delete_by_sid();
        let sid_str = sid.as_str().to_string();

        self.conn
            .call(move |conn| {
                let rows = conn.execute(&sql, [&sid_str]).map_err(wrap_err)?;
                Ok(rows as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, sid.as_str()))
    }

    async fn count(&self) -> TableResult<u64> {
        let sql = self.schema.count();

        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(&sql, [], |row| row.get(0)).map_err(wrap_err)?;
                Ok(count as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, ""))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> TableResult<u64> {
        let sql = self.schema.delete_expired();
        let now_str = format_datetime(&now);

        self.conn
            .call(move |conn| {
                let rows = conn.execute(&sql, [&now_str]).map_err(wrap_err)?;
                Ok(rows as u64)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sessionstore_core::session::ExtraFields;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    async fn table() -> SqliteSessionTable {
        let table = SqliteSessionTable::open_in_memory()
            .await
            .unwrap()
            .with_extra_columns(["user_id", "visits"]);
        table.sync().await.unwrap();
        table
    }

    fn create_test_row(sid: &str) -> SessionRow {
        let mut extra = ExtraFields::new();
        extra.insert("user_id".to_string(), ColumnValue::from("alice"));
        extra.insert("visits".to_string(), ColumnValue::Integer(3));
        SessionRow::new(SessionId::from(sid), "blob", fixed_now() + Duration::hours(1))
            .with_extra(extra)
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let table = table().await;
        table.sync().await.unwrap();
        assert_eq!(table.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_or_create_then_find_one() {
        let table = table().await;
        let row = create_test_row("abc");

        let (stored, created) = table.find_or_create(&row).await.unwrap();
        assert!(created);
        assert_eq!(stored, row);

        let found = table.find_one(&SessionId::from("abc")).await.unwrap();
        assert_eq!(found, Some(row));
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing_row() {
        let table = table().await;
        table.find_or_create(&create_test_row("abc")).await.unwrap();

        let other = SessionRow::new(SessionId::from("abc"), "other", fixed_now());
        let (existing, created) = table.find_or_create(&other).await.unwrap();

        assert!(!created);
        assert_eq!(existing.data, "blob");
        assert_eq!(table.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_extra_columns_read_back_as_null() {
        let table = table().await;
        let row = SessionRow::new(SessionId::from("abc"), "blob", fixed_now());

        let (stored, _) = table.find_or_create(&row).await.unwrap();

        assert_eq!(stored.extra["user_id"], ColumnValue::Null);
        let found = table.find_one(&SessionId::from("abc")).await.unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_unknown_extra_column_is_rejected() {
        let table = table().await;
        let mut extra = ExtraFields::new();
        extra.insert("role".to_string(), ColumnValue::from("admin"));
        let row = SessionRow::new(SessionId::from("abc"), "blob", fixed_now()).with_extra(extra);

        let result = table.find_or_create(&row).await;

        assert!(matches!(result, Err(TableError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_update_expires_only_keeps_data() {
        let table = table().await;
        table.find_or_create(&create_test_row("abc")).await.unwrap();
        let later = fixed_now() + Duration::days(2);

        let affected = table
            .update(&SessionId::from("abc"), &RowUpdate::expires_only(later))
            .await
            .unwrap();

        assert_eq!(affected, 1);
        let row = table.find_one(&SessionId::from("abc")).await.unwrap().unwrap();
        assert_eq!(row.data, "blob");
        assert_eq!(row.expires, later);
        assert_eq!(row.extra["user_id"], ColumnValue::from("alice"));
    }

    #[tokio::test]
    async fn test_update_data_and_extra_columns() {
        let table = table().await;
        table.find_or_create(&create_test_row("abc")).await.unwrap();

        let mut extra = ExtraFields::new();
        extra.insert("visits".to_string(), ColumnValue::Integer(4));
        let update = RowUpdate {
            data: Some("other".to_string()),
            expires: fixed_now(),
            extra,
        };
        table.update(&SessionId::from("abc"), &update).await.unwrap();

        let row = table.find_one(&SessionId::from("abc")).await.unwrap().unwrap();
        assert_eq!(row.data, "other");
        assert_eq!(row.extra["visits"], ColumnValue::Integer(4));
        assert_eq!(row.extra["user_id"], ColumnValue::from("alice"));
    }

    #[tokio::test]
    async fn test_update_nonexistent_affects_nothing() {
        let table = table().await;
        let affected = table
            .update(&SessionId::from("nope"), &RowUpdate::expires_only(fixed_now()))
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let table = table().await;
        table.find_or_create(&create_test_row("abc")).await.unwrap();

        assert_eq!(table.destroy(&SessionId::from("abc")).await.unwrap(), 1);
        assert_eq!(table.destroy(&SessionId::from("abc")).await.unwrap(), 0);
        assert!(table.find_one(&SessionId::from("abc")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired_is_strict() {
        let table = table().await;
        table
            .find_or_create(&SessionRow::new(SessionId::from("edge"), "blob", fixed_now()))
            .await
            .unwrap();
        table
            .find_or_create(&SessionRow::new(
                SessionId::from("past"),
                "blob",
                fixed_now() - Duration::milliseconds(1),
            ))
            .await
            .unwrap();
        table.find_or_create(&create_test_row("future")).await.unwrap();

        let deleted = table.delete_expired(fixed_now()).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(table.count().await.unwrap(), 2);
        assert!(table.find_one(&SessionId::from("past")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_custom_table_name() {
        let table = SqliteSessionTable::open_in_memory()
            .await
            .unwrap()
            .with_table_name("web_sessions");
        table.sync().await.unwrap();

        table
            .find_or_create(&SessionRow::new(SessionId::from("abc"), "blob", fixed_now()))
            .await
            .unwrap();

        assert_eq!(table.table_name(), "web_sessions");
        assert_eq!(table.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_query_failure() {
        let table = SqliteSessionTable::open_in_memory().await.unwrap();

        let result = table.count().await;

        assert!(matches!(result, Err(TableError::QueryFailed(_))));
    }
}
