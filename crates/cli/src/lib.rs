//! sessionstore_cli - operator CLI for sessionstore tables.

pub mod cli;
pub mod output;
