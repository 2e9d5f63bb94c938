// ABOUTME: Library root for sqlite-mirror
// ABOUTME: Diff-and-sync engine for keeping one SQLite database aligned with another

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod quoting;
pub mod rows;
pub mod schema;

pub use error::{ExportError, SyncError};
