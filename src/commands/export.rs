// ABOUTME: The export command - full snapshot dump of tables to flat files
// ABOUTME: One newline-delimited JSON file per table under the output directory

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::export::{export_table, ConsoleProgress};
use crate::quoting::Quoter;
use crate::schema::reader::read_schema;
use crate::schema::ObjectKind;

pub struct ExportOptions {
    /// Restrict the dump to these tables; all tables when unset.
    pub tables: Option<Vec<String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { tables: None }
    }
}

/// Dump every selected table to `<dir>/<table>`.
///
/// Each run produces a full snapshot; existing files are truncated. A run
/// that fails partway leaves the already-written files of earlier tables
/// complete and the failing table's file partial.
pub fn run(source_path: &Path, dir: &Path, opts: &ExportOptions) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let source = crate::commands::sync::open_source(source_path)?;
    let quoter = Quoter::default();

    let schema = read_schema(&source).context("Failed to read source schema")?;
    let known: Vec<&str> = schema
        .iter()
        .filter(|o| o.kind == ObjectKind::Table)
        .map(|o| o.name.as_str())
        .collect();

    let selected: Vec<&str> = match &opts.tables {
        Some(requested) => {
            for table in requested {
                if !known.contains(&table.as_str()) {
                    bail!("Table '{}' does not exist in the source database", table);
                }
            }
            requested.iter().map(String::as_str).collect()
        }
        None => known,
    };

    let mut total_rows = 0u64;
    for table in &selected {
        let mut progress = ConsoleProgress::new();
        let rows = export_table(&source, table, dir, &quoter, &mut progress)
            .with_context(|| format!("Export of table '{}' failed", table))?;
        println!("Exported {} row(s) from '{}'", rows, table);
        total_rows += rows;
    }

    println!();
    println!(
        "Export complete: {} table(s), {} row(s) written to {}",
        selected.len(),
        total_rows,
        dir.display()
    );

    Ok(())
}
