//! Encrypted session storage over a relational table.
//!
//! This crate is the imperative shell around `sessionstore_core`:
//! - `TableStore`, the `SessionStore` implementation, and its builder
//! - `StoreConfig` loaded from the environment
//! - A background expiry sweeper
//! - Table backends (SQLite or in-memory via feature flags)

mod config;
mod observer;
mod store;
mod sweeper;
pub mod tables;

pub use config::{
    StoreConfig, DEFAULT_CHECK_EXPIRATION_INTERVAL, DEFAULT_EXPIRATION, DEFAULT_TABLE,
};
pub use observer::{NoopObserver, StoreObserver, TracingObserver};
pub use store::{ExtendDefaultFields, StoreBuilder, TableStore};
pub use sweeper::ExpirySweeper;

pub use sessionstore_core::session::{
    ColumnValue, ExtraFields, Result, SessionData, SessionId, SessionRow, SessionStore,
    SessionTable, StoreError, TableError,
};
