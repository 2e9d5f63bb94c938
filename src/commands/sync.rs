// ABOUTME: The sync command - schema sync to completion, then per-table row sync
// ABOUTME: Schema phase commits or rolls back before any row work begins

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::quoting::Quoter;
use crate::rows::applier::{sync_table_rows, RowSyncOptions, DEFAULT_BATCH_SIZE};
use crate::rows::differ::diff_key_sets;
use crate::rows::reader::read_key_set;
use crate::rows::KeyColumnPolicy;
use crate::schema::applier::apply_schema_diff;
use crate::schema::differ::diff_schemas;
use crate::schema::reader::read_schema;
use crate::schema::ObjectKind;

pub struct SyncOptions {
    /// Keys per row-sync statement; 0 disables batching.
    pub batch_size: usize,
    /// Stop after the schema phase.
    pub schema_only: bool,
    /// Restrict row sync to these tables. Schema sync always covers the
    /// whole database.
    pub tables: Option<Vec<String>>,
    pub key_columns: KeyColumnPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            schema_only: false,
            tables: None,
            key_columns: KeyColumnPolicy::default(),
        }
    }
}

/// Bring the destination into alignment with the source.
///
/// The run stops at the first fatal error. Whatever was committed before the
/// failure (the schema phase, row sync of earlier tables) stays committed;
/// re-running after fixing the cause converges because every diff is
/// recomputed fresh.
///
/// The destination handle is treated as exclusively owned for the duration
/// of the run. Concurrent external writers to the destination can produce
/// lost updates; keeping them away is the caller's responsibility.
pub fn run(source_path: &Path, dest_path: &Path, opts: &SyncOptions) -> Result<()> {
    let source = open_source(source_path)?;
    let mut dest = open_destination(dest_path)?;
    let quoter = Quoter::default();

    let source_schema = read_schema(&source).context("Failed to read source schema")?;
    let dest_schema = read_schema(&dest).context("Failed to read destination schema")?;

    let entries = diff_schemas(&source_schema, &dest_schema);
    if entries.is_empty() {
        tracing::info!("Schemas already match");
    } else {
        tracing::info!("Applying {} schema change(s)", entries.len());
        for entry in &entries {
            tracing::debug!("  {}", entry);
        }
        apply_schema_diff(&mut dest, &entries, &quoter, true).context("Schema sync failed")?;
    }

    if opts.schema_only {
        println!("Schema sync complete: {} change(s) applied", entries.len());
        return Ok(());
    }

    let row_opts = RowSyncOptions {
        batch_size: opts.batch_size,
        transactional: true,
    };

    let mut tables_changed = 0usize;
    let mut rows_copied = 0usize;
    let mut rows_deleted = 0usize;

    for object in &source_schema {
        if object.kind != ObjectKind::Table {
            continue;
        }
        if let Some(only) = &opts.tables {
            if !only.iter().any(|t| t == &object.name) {
                continue;
            }
        }

        let table = object.name.as_str();
        let key_column = opts.key_columns.key_column(table);

        let source_keys = read_key_set(&source, table, key_column, &quoter)
            .with_context(|| format!("Failed to read keys of source table '{}'", table))?;
        let dest_keys = read_key_set(&dest, table, key_column, &quoter)
            .with_context(|| format!("Failed to read keys of destination table '{}'", table))?;

        let diff = diff_key_sets(&source_keys, &dest_keys);
        if diff.is_empty() {
            tracing::debug!("Table '{}' has no row changes", table);
            continue;
        }

        let stats = sync_table_rows(&source, &mut dest, table, key_column, &diff, &row_opts, &quoter)
            .with_context(|| format!("Row sync failed for table '{}'", table))?;

        tables_changed += 1;
        rows_copied += stats.rows_copied;
        rows_deleted += stats.rows_deleted;
    }

    println!();
    println!("========================================");
    println!("Sync complete");
    println!("========================================");
    println!("  Schema changes applied: {}", entries.len());
    println!("  Tables with row changes: {}", tables_changed);
    println!("  Rows copied: {}", rows_copied);
    println!("  Rows deleted: {}", rows_deleted);

    Ok(())
}

/// Open the source read-only. The engine never mutates the source, and a
/// mistyped path must not materialize an empty database file.
pub(crate) fn open_source(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open source database {}", path.display()))
}

pub(crate) fn open_destination(path: &Path) -> Result<Connection> {
    Connection::open(path)
        .with_context(|| format!("Failed to open destination database {}", path.display()))
}
