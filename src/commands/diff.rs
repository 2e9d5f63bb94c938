// ABOUTME: The diff command - reports pending schema and row differences
// ABOUTME: Dry run only; opens both databases read-only and mutates nothing

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::quoting::Quoter;
use crate::rows::differ::diff_key_sets;
use crate::rows::reader::read_key_set;
use crate::rows::KeyColumnPolicy;
use crate::schema::differ::{diff_schemas, SchemaDiffEntry};
use crate::schema::reader::read_schema;
use crate::schema::ObjectKind;

pub struct DiffOptions {
    pub tables: Option<Vec<String>>,
    pub key_columns: KeyColumnPolicy,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            tables: None,
            key_columns: KeyColumnPolicy::default(),
        }
    }
}

/// Report what a sync would change, without changing anything.
pub fn run(source_path: &Path, dest_path: &Path, opts: &DiffOptions) -> Result<()> {
    let source = open_readonly(source_path, "source")?;
    let dest = open_readonly(dest_path, "destination")?;
    let quoter = Quoter::default();

    let source_schema = read_schema(&source).context("Failed to read source schema")?;
    let dest_schema = read_schema(&dest).context("Failed to read destination schema")?;
    let entries = diff_schemas(&source_schema, &dest_schema);

    if !entries.is_empty() {
        println!("Schema changes:");
        for entry in &entries {
            println!("  {}", entry);
            if let SchemaDiffEntry::Updated { field_diffs, .. } = entry {
                for field_diff in field_diffs {
                    println!("    {}", field_diff);
                }
            }
        }
    }

    // Row differences are only meaningful for tables present on both sides;
    // a created table implies a full copy and is reported as such.
    let mut row_changes = 0usize;
    let mut row_lines = Vec::new();
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

        let in_dest = dest_schema
            .iter()
            .any(|o| o.identity() == (ObjectKind::Table, table));
        if !in_dest {
            let source_keys = read_key_set(&source, table, key_column, &quoter)
                .with_context(|| format!("Failed to read keys of source table '{}'", table))?;
            if !source_keys.is_empty() {
                row_changes += 1;
                row_lines.push(format!(
                    "  {}: {} to copy (new table)",
                    table,
                    source_keys.len()
                ));
            }
            continue;
        }

        let source_keys = read_key_set(&source, table, key_column, &quoter)
            .with_context(|| format!("Failed to read keys of source table '{}'", table))?;
        let dest_keys = read_key_set(&dest, table, key_column, &quoter)
            .with_context(|| format!("Failed to read keys of destination table '{}'", table))?;
        let diff = diff_key_sets(&source_keys, &dest_keys);
        if diff.is_empty() {
            continue;
        }

        row_changes += 1;
        row_lines.push(format!(
            "  {}: {} to copy, {} to delete",
            table,
            diff.created.len(),
            diff.deleted.len()
        ));
    }

    if !row_lines.is_empty() {
        println!("Row changes:");
        for line in row_lines {
            println!("{}", line);
        }
    }

    if entries.is_empty() && row_changes == 0 {
        println!("Source and destination are already in sync.");
    }

    Ok(())
}

fn open_readonly(path: &Path, role: &str) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {} database {}", role, path.display()))
}
