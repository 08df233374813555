//! `SessionTable` implementations.
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite table using `rusqlite` and `tokio-rusqlite`
//! - `inmemory` (default): `HashMap`-backed table for development and tests

#[cfg(feature = "inmemory")]
mod inmemory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemorySessionTable;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionTable;
