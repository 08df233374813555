//! Functional core for sessionstore.
//!
//! Types, traits and pure functions shared by the store and its table
//! backends. Nothing in here performs I/O.

pub mod session;
