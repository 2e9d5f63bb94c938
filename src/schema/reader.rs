// ABOUTME: Schema snapshot reader over sqlite_master
// ABOUTME: Returns tables and indexes with non-null definition text in creation order

use rusqlite::Connection;

use crate::error::Result;
use crate::schema::{parser, ObjectKind, SchemaObject};

/// Read the current structural definition of a database.
///
/// Queries `sqlite_master` for tables and indexes that carry definition
/// text. Objects without one (implicit auto-indexes backing PRIMARY KEY and
/// UNIQUE constraints) and `sqlite_%` internals are excluded. Ordering
/// follows `rowid`, which is creation order, so repeated snapshots of an
/// unchanged database are identical.
///
/// Read-only; failures propagate without retry.
pub fn read_schema(conn: &Connection) -> Result<Vec<SchemaObject>> {
    tracing::debug!("Reading schema objects from sqlite_master");

    let mut stmt = conn.prepare(
        "SELECT type, name, sql FROM sqlite_master \
         WHERE type IN ('table', 'index') \
         AND name NOT LIKE 'sqlite_%' \
         AND sql IS NOT NULL \
         ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut objects = Vec::with_capacity(rows.len());
    for (kind, name, sql) in rows {
        let kind = match kind.as_str() {
            "table" => ObjectKind::Table,
            "index" => ObjectKind::Index,
            other => {
                tracing::warn!("Skipping schema object '{}' of unexpected type '{}'", name, other);
                continue;
            }
        };

        let table = if kind == ObjectKind::Table {
            let parsed = parser::parse_create_table(&sql);
            if parsed.is_none() {
                tracing::warn!(
                    "Could not parse definition of table '{}', falling back to text comparison",
                    name
                );
            }
            parsed
        } else {
            None
        };

        objects.push(SchemaObject {
            kind,
            name,
            sql,
            table,
        });
    }

    tracing::info!("Read {} schema object(s)", objects.len());

    Ok(objects)
}
