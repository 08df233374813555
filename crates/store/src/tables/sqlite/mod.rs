//! SQLite session table.
//!
//! Implements `SessionTable` with `rusqlite` for the statements and
//! `tokio-rusqlite` for running them off the async executor. Timestamps are
//! stored as fixed-width RFC 3339 text so `expires < ?` compares instants.

mod conversions;
mod error;
mod repository;
mod schema;

pub use repository::SqliteSessionTable;
pub use schema::TableSchema;
