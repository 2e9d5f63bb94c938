// ABOUTME: Row-identity reader - extracts the key set of one table
// ABOUTME: Point-in-time snapshot, recomputed on every run, nothing cached

use rusqlite::Connection;

use crate::error::Result;
use crate::quoting::Quoter;
use crate::rows::RowKey;

/// Read all values of a table's identity column.
///
/// Read-only; propagates the underlying query failure without retry. A NULL
/// in the key column is an error, since such a row cannot be identified for
/// comparison.
pub fn read_key_set(
    conn: &Connection,
    table: &str,
    key_column: &str,
    quoter: &Quoter,
) -> Result<Vec<RowKey>> {
    let query = format!(
        "SELECT {} FROM {}",
        quoter.ident(key_column),
        quoter.ident(table)
    );

    let mut stmt = conn.prepare(&query)?;
    let keys = stmt
        .query_map([], |row| row.get::<_, RowKey>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    tracing::debug!(
        "Read {} key(s) from table '{}' (key column '{}')",
        keys.len(),
        table,
        key_column
    );

    Ok(keys)
}
