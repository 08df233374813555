//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `TableError`.
//! Key conflicts become `AlreadyExists` so `set` can retry them as updates.

use sessionstore_core::session::TableError;

/// Maps a rusqlite error to a TableError.
///
/// # Error Mapping
///
/// - `SQLITE_CONSTRAINT_UNIQUE` / `SQLITE_CONSTRAINT_PRIMARYKEY` → `TableError::AlreadyExists`
/// - Connection errors → `TableError::ConnectionFailed`
/// - Column conversion failures → `TableError::InvalidData`
/// - All other errors → `TableError::QueryFailed`
fn map_rusqlite_error(err: &rusqlite::Error, sid: &str) -> TableError {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            TableError::AlreadyExists {
                sid: sid.to_string(),
            }
        }

        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::CannotOpen =>
        {
            TableError::ConnectionFailed(format!("Cannot open database: {err}"))
        }

        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            TableError::InvalidData(err.to_string())
        }

        _ => TableError::QueryFailed(err.to_string()),
    }
}

/// Maps a tokio_rusqlite error to a TableError.
///
/// Pass the session ID the statement was about, or an empty string for
/// statements that touch many rows.
pub fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error, sid: &str) -> TableError {
    match &err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => map_rusqlite_error(rusqlite_err, sid),
        tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => {
            TableError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        _ => TableError::QueryFailed(err.to_string()),
    }
}
