use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RowUpdate, SessionData, SessionId, SessionRow, StoreError, TableError};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Result type for table operations.
pub type TableResult<T> = std::result::Result<T, TableError>;

/// Storage backend contract consumed by a session middleware.
///
/// "Not found" is never an error: `get` returns `None`, and `touch` or
/// `destroy` on an unknown session succeed without doing anything.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load and decode the payload stored for `sid`.
    async fn get(&self, sid: &SessionId) -> Result<Option<SessionData>>;

    /// Store `data` under `sid`, creating the row if needed.
    async fn set(&self, sid: &SessionId, data: &SessionData) -> Result<SessionRow>;

    /// Refresh the expiry of `sid` without rewriting its payload.
    async fn touch(&self, sid: &SessionId, data: &SessionData) -> Result<()>;

    /// Remove the session.
    async fn destroy(&self, sid: &SessionId) -> Result<()>;

    /// Number of stored sessions, including expired rows not yet swept.
    async fn length(&self) -> Result<u64>;
}

/// Key-indexed relational table holding session rows.
#[async_trait]
pub trait SessionTable: Send + Sync {
    /// Name of the underlying table.
    fn table_name(&self) -> &str;

    /// Create the table if it does not exist.
    async fn sync(&self) -> TableResult<()>;

    /// Fetch the row for `sid`.
    async fn find_one(&self, sid: &SessionId) -> TableResult<Option<SessionRow>>;

    /// Insert `defaults` unless a row with the same sid exists.
    ///
    /// Returns the stored row and whether it was created by this call.
    async fn find_or_create(&self, defaults: &SessionRow) -> TableResult<(SessionRow, bool)>;

    /// Apply `update` to the row for `sid`. Returns the number of affected rows.
    async fn update(&self, sid: &SessionId, update: &RowUpdate) -> TableResult<u64>;

    /// Delete the row for `sid`. Returns the number of deleted rows.
    async fn destroy(&self, sid: &SessionId) -> TableResult<u64>;

    /// Total number of rows.
    async fn count(&self) -> TableResult<u64>;

    /// Delete every row whose expiry is strictly before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> TableResult<u64>;
}
