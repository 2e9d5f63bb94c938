// ABOUTME: Error taxonomy for the diff-and-sync engine
// ABOUTME: Typed failures carry the offending diff entry or table/batch for diagnosis

use thiserror::Error;

use crate::schema::differ::SchemaDiffEntry;

/// Failures surfaced by the sync engine.
///
/// All failures are fatal to the current run. Nothing is retried: diffs are
/// recomputed fresh on every run and applying them is idempotent, so the
/// expected recovery path is to fix the underlying cause and re-run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A query against the source or destination database failed.
    #[error("database access failed")]
    Read(#[from] rusqlite::Error),

    /// A structural change could not be applied to the destination.
    ///
    /// When the applier runs transactionally the whole batch has been rolled
    /// back by the time this surfaces.
    #[error("failed to apply schema change: {entry}")]
    SchemaApply {
        entry: SchemaDiffEntry,
        #[source]
        source: rusqlite::Error,
    },

    /// A batched row delete or copy failed.
    ///
    /// Aborts the affected table's transaction. Tables already committed
    /// earlier in the run stay committed.
    #[error("row sync failed for table '{table}' (batch {batch})")]
    RowSync {
        table: String,
        batch: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// A snapshot export failed mid-stream.
    ///
    /// The partial output file carries no completion marker and must be
    /// treated as invalid in its entirety.
    #[error("failed to export table '{table}'")]
    Export {
        table: String,
        #[source]
        source: ExportError,
    },
}

/// Underlying cause of an export failure.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Query(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
