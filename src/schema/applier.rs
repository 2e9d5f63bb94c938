// ABOUTME: Schema applier - executes an ordered diff list against the destination
// ABOUTME: One transaction per batch unless the caller opts out; rebuilds are drop-and-recreate

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::{Result, SyncError};
use crate::quoting::Quoter;
use crate::schema::differ::SchemaDiffEntry;
use crate::schema::ObjectKind;

/// Apply an ordered list of schema changes to the destination.
///
/// Created objects execute their full definition statement; updated objects
/// are dropped and recreated from the source definition (no in-place ALTER,
/// even where SQLite could express one); deleted objects are dropped.
///
/// With `transactional` set (the default for callers driving a plain schema
/// sync), every entry applies inside a single transaction and any statement
/// failure rolls the whole batch back. Callers that batch schema and data
/// work in one outer transaction of their own pass `false`.
pub fn apply_schema_diff(
    conn: &mut Connection,
    entries: &[SchemaDiffEntry],
    quoter: &Quoter,
    transactional: bool,
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    if transactional {
        let tx = conn.transaction()?;
        apply_entries(&tx, entries, quoter)?;
        tx.commit()?;
    } else {
        apply_entries(conn, entries, quoter)?;
    }

    Ok(())
}

fn apply_entries(conn: &Connection, entries: &[SchemaDiffEntry], quoter: &Quoter) -> Result<()> {
    // Indexes the diff itself creates, rebuilds or drops. Rebuilding a table
    // silently drops its indexes, and the unchanged ones must be restored or
    // the next snapshot would no longer match the source; the touched ones
    // are left to their own entries.
    let touched_indexes: HashSet<&str> = entries
        .iter()
        .filter(|e| e.kind() == ObjectKind::Index)
        .map(|e| e.name())
        .collect();

    for entry in entries {
        apply_entry(conn, entry, quoter, &touched_indexes).map_err(|source| {
            SyncError::SchemaApply {
                entry: entry.clone(),
                source,
            }
        })?;
        tracing::debug!("Applied schema change: {}", entry);
    }

    Ok(())
}

fn apply_entry(
    conn: &Connection,
    entry: &SchemaDiffEntry,
    quoter: &Quoter,
    touched_indexes: &HashSet<&str>,
) -> rusqlite::Result<()> {
    match entry {
        SchemaDiffEntry::Created(object) => {
            conn.execute(&object.sql, [])?;
        }
        SchemaDiffEntry::Updated { object, .. } => {
            let saved_indexes = if object.kind == ObjectKind::Table {
                dependent_index_sql(conn, &object.name, touched_indexes)?
            } else {
                Vec::new()
            };

            conn.execute(&drop_statement(object.kind, &object.name, quoter), [])?;
            conn.execute(&object.sql, [])?;

            for index_sql in saved_indexes {
                conn.execute(&index_sql, [])?;
            }
        }
        SchemaDiffEntry::Deleted { kind, name } => {
            conn.execute(&drop_statement(*kind, name, quoter), [])?;
        }
    }

    Ok(())
}

/// `DROP TABLE|INDEX IF EXISTS "name"`.
///
/// `IF EXISTS` keeps the list order-insensitive to cascades: dropping a
/// table already removed this entry's index, and vice versa.
fn drop_statement(kind: ObjectKind, name: &str, quoter: &Quoter) -> String {
    format!(
        "DROP {} IF EXISTS {}",
        kind.sql_keyword(),
        quoter.ident(name)
    )
}

/// Definition text of the named table's indexes, excluding indexes the
/// current diff handles itself.
fn dependent_index_sql(
    conn: &Connection,
    table: &str,
    touched_indexes: &HashSet<&str>,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL \
         ORDER BY rowid",
    )?;

    let indexes = stmt
        .query_map([table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(indexes
        .into_iter()
        .filter(|(name, _)| !touched_indexes.contains(name.as_str()))
        .map(|(_, sql)| sql)
        .collect())
}
