// ABOUTME: Row sync applier - batched deletes and copy-forward inserts for one table
// ABOUTME: All work for a table runs in one transaction unless the caller opts out

use rusqlite::{params_from_iter, Connection};

use crate::error::{Result, SyncError};
use crate::quoting::Quoter;
use crate::rows::{RowKey, RowKeyDiff};

/// Default number of keys per statement. Bounds SQL parameter counts and
/// lock duration on large deletes.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Options for applying a row diff to one table.
#[derive(Debug, Clone)]
pub struct RowSyncOptions {
    /// Keys per statement. `0` disables batching: one unbounded statement.
    pub batch_size: usize,
    /// When set, all batches for the table run inside a single transaction
    /// and any failure rolls the table back wholesale.
    pub transactional: bool,
}

impl Default for RowSyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transactional: true,
        }
    }
}

/// Counters for one table's row sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowSyncStats {
    pub rows_deleted: usize,
    pub rows_copied: usize,
    pub delete_batches: usize,
    pub copy_batches: usize,
}

/// Apply a row key diff to the destination table.
///
/// Keys in `deleted` are removed from the destination in batches of at most
/// `batch_size`, one `DELETE ... WHERE key IN (...)` per batch. Keys in
/// `created` are copied forward: the full source row for each key is read
/// and written into the destination with `INSERT OR REPLACE`, batched the
/// same way and inside the same transaction as the deletions.
///
/// A batch failure aborts the whole table's sync; when transactional,
/// nothing of this table is applied. Tables committed earlier in the run are
/// unaffected.
pub fn sync_table_rows(
    source: &Connection,
    dest: &mut Connection,
    table: &str,
    key_column: &str,
    diff: &RowKeyDiff,
    opts: &RowSyncOptions,
    quoter: &Quoter,
) -> Result<RowSyncStats> {
    if diff.is_empty() {
        return Ok(RowSyncStats::default());
    }

    let stats = if opts.transactional {
        let tx = dest.transaction()?;
        let stats = apply_diff(source, &tx, table, key_column, diff, opts.batch_size, quoter)?;
        tx.commit()?;
        stats
    } else {
        apply_diff(source, dest, table, key_column, diff, opts.batch_size, quoter)?
    };

    tracing::info!(
        "Synced rows for table '{}': {} deleted, {} copied",
        table,
        stats.rows_deleted,
        stats.rows_copied
    );

    Ok(stats)
}

fn apply_diff(
    source: &Connection,
    dest: &Connection,
    table: &str,
    key_column: &str,
    diff: &RowKeyDiff,
    batch_size: usize,
    quoter: &Quoter,
) -> Result<RowSyncStats> {
    let mut stats = RowSyncStats::default();
    let mut batch = 0usize;

    for keys in key_batches(&diff.deleted, batch_size) {
        batch += 1;
        let deleted = delete_batch(dest, table, key_column, keys, quoter).map_err(|source| {
            SyncError::RowSync {
                table: table.to_string(),
                batch,
                source,
            }
        })?;
        stats.rows_deleted += deleted;
        stats.delete_batches += 1;
    }

    for keys in key_batches(&diff.created, batch_size) {
        batch += 1;
        let copied =
            copy_batch(source, dest, table, key_column, keys, quoter).map_err(|source| {
                SyncError::RowSync {
                    table: table.to_string(),
                    batch,
                    source,
                }
            })?;
        stats.rows_copied += copied;
        stats.copy_batches += 1;
    }

    Ok(stats)
}

/// Partition keys into batches of at most `batch_size`; `0` yields a single
/// unbounded batch.
pub fn key_batches(keys: &[RowKey], batch_size: usize) -> impl Iterator<Item = &[RowKey]> {
    let chunk = if batch_size == 0 {
        keys.len().max(1)
    } else {
        batch_size
    };
    keys.chunks(chunk)
}

fn delete_batch(
    dest: &Connection,
    table: &str,
    key_column: &str,
    keys: &[RowKey],
    quoter: &Quoter,
) -> rusqlite::Result<usize> {
    let sql = delete_statement(table, key_column, keys.len(), quoter);
    let affected = dest.execute(&sql, params_from_iter(keys.iter()))?;

    tracing::debug!(
        "Deleted {} row(s) from '{}' ({} key(s) in batch)",
        affected,
        table,
        keys.len()
    );

    Ok(affected)
}

/// Copy the source rows identified by `keys` into the destination.
///
/// Column order comes from the source result set; both sides share the
/// structure because schema sync completes before any row sync runs.
fn copy_batch(
    source: &Connection,
    dest: &Connection,
    table: &str,
    key_column: &str,
    keys: &[RowKey],
    quoter: &Quoter,
) -> rusqlite::Result<usize> {
    let select = select_statement(table, key_column, keys.len(), quoter);
    let mut stmt = source.prepare(&select)?;
    let column_count = stmt.column_count();
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let rows: Vec<Vec<rusqlite::types::Value>> = stmt
        .query_map(params_from_iter(keys.iter()), |row| {
            (0..column_count)
                .map(|idx| row.get::<_, rusqlite::types::Value>(idx))
                .collect()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let insert = insert_statement(table, &columns, quoter);
    let mut insert_stmt = dest.prepare(&insert)?;

    let mut copied = 0usize;
    for row in &rows {
        copied += insert_stmt.execute(params_from_iter(row.iter()))?;
    }

    tracing::debug!(
        "Copied {} row(s) into '{}' ({} key(s) in batch)",
        copied,
        table,
        keys.len()
    );

    Ok(copied)
}

/// `DELETE FROM "table" WHERE "key" IN (?, ?, ...)`.
fn delete_statement(table: &str, key_column: &str, key_count: usize, quoter: &Quoter) -> String {
    format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quoter.ident(table),
        quoter.ident(key_column),
        placeholders(key_count)
    )
}

/// `SELECT * FROM "table" WHERE "key" IN (?, ?, ...)`.
fn select_statement(table: &str, key_column: &str, key_count: usize, quoter: &Quoter) -> String {
    format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        quoter.ident(table),
        quoter.ident(key_column),
        placeholders(key_count)
    )
}

/// `INSERT OR REPLACE INTO "table" ("a", "b") VALUES (?, ?)`.
fn insert_statement(table: &str, columns: &[String], quoter: &Quoter) -> String {
    let column_list = columns
        .iter()
        .map(|c| quoter.ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quoter.ident(table),
        column_list,
        placeholders(columns.len())
    )
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::differ::diff_key_sets;
    use crate::rows::reader::read_key_set;

    fn ints(values: &[i64]) -> Vec<RowKey> {
        values.iter().map(|v| RowKey::Integer(*v)).collect()
    }

    fn posts_db(ids: &[i64]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT, body TEXT)",
            [],
        )
        .unwrap();
        for id in ids {
            conn.execute(
                "INSERT INTO posts (id, title, body) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, format!("title {}", id), format!("body {}", id)],
            )
            .unwrap();
        }
        conn
    }

    fn post_ids(conn: &Connection) -> Vec<i64> {
        let mut stmt = conn.prepare("SELECT id FROM posts ORDER BY id").unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_delete_statement() {
        let sql = delete_statement("posts", "id", 3, &Quoter::default());
        assert_eq!(sql, "DELETE FROM \"posts\" WHERE \"id\" IN (?, ?, ?)");
    }

    #[test]
    fn test_select_statement() {
        let sql = select_statement("locks", "index", 2, &Quoter::default());
        assert_eq!(sql, "SELECT * FROM \"locks\" WHERE \"index\" IN (?, ?)");
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement(
            "posts",
            &["id".to_string(), "title".to_string()],
            &Quoter::default(),
        );
        assert_eq!(
            sql,
            "INSERT OR REPLACE INTO \"posts\" (\"id\", \"title\") VALUES (?, ?)"
        );
    }

    #[test]
    fn test_key_batches_counts() {
        let keys = ints(&[1, 2, 3, 4, 5]);

        let batches: Vec<_> = key_batches(&keys, 2).collect();
        assert_eq!(batches.len(), 3); // ceil(5 / 2)
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2].len(), 1);

        // The batches repartition the original set with no duplicates.
        let flattened: Vec<RowKey> = batches.into_iter().flatten().cloned().collect();
        assert_eq!(flattened, keys);
    }

    #[test]
    fn test_key_batches_zero_means_single_batch() {
        let keys = ints(&[1, 2, 3]);
        let batches: Vec<_> = key_batches(&keys, 0).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[test]
    fn test_key_batches_empty_input() {
        assert_eq!(key_batches(&[], 0).count(), 0);
        assert_eq!(key_batches(&[], 10).count(), 0);
    }

    #[test]
    fn test_sync_deletes_and_copies() {
        let source = posts_db(&[1, 2, 3]);
        let mut dest = posts_db(&[2, 3, 4]);

        let quoter = Quoter::default();
        let src_keys = read_key_set(&source, "posts", "id", &quoter).unwrap();
        let dst_keys = read_key_set(&dest, "posts", "id", &quoter).unwrap();
        let diff = diff_key_sets(&src_keys, &dst_keys);
        assert_eq!(diff.created, ints(&[1]));
        assert_eq!(diff.deleted, ints(&[4]));

        let stats = sync_table_rows(
            &source,
            &mut dest,
            "posts",
            "id",
            &diff,
            &RowSyncOptions::default(),
            &quoter,
        )
        .unwrap();

        assert_eq!(stats.rows_deleted, 1);
        assert_eq!(stats.rows_copied, 1);
        assert_eq!(post_ids(&dest), vec![1, 2, 3]);

        // The copied row carries all its columns.
        let title: String = dest
            .query_row("SELECT title FROM posts WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "title 1");
    }

    #[test]
    fn test_sync_batching_statement_counts() {
        let source = posts_db(&(1..=7).collect::<Vec<_>>());
        let mut dest = posts_db(&(101..=105).collect::<Vec<_>>());

        let quoter = Quoter::default();
        let diff = diff_key_sets(
            &read_key_set(&source, "posts", "id", &quoter).unwrap(),
            &read_key_set(&dest, "posts", "id", &quoter).unwrap(),
        );

        let opts = RowSyncOptions {
            batch_size: 2,
            transactional: true,
        };
        let stats =
            sync_table_rows(&source, &mut dest, "posts", "id", &diff, &opts, &quoter).unwrap();

        assert_eq!(stats.delete_batches, 3); // ceil(5 / 2)
        assert_eq!(stats.copy_batches, 4); // ceil(7 / 2)
        assert_eq!(stats.rows_deleted, 5);
        assert_eq!(stats.rows_copied, 7);
        assert_eq!(post_ids(&dest), (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_sync_unbounded_batch() {
        let source = posts_db(&[1, 2, 3]);
        let mut dest = posts_db(&[4, 5]);

        let quoter = Quoter::default();
        let diff = diff_key_sets(
            &read_key_set(&source, "posts", "id", &quoter).unwrap(),
            &read_key_set(&dest, "posts", "id", &quoter).unwrap(),
        );

        let opts = RowSyncOptions {
            batch_size: 0,
            transactional: true,
        };
        let stats =
            sync_table_rows(&source, &mut dest, "posts", "id", &diff, &opts, &quoter).unwrap();

        assert_eq!(stats.delete_batches, 1);
        assert_eq!(stats.copy_batches, 1);
        assert_eq!(post_ids(&dest), vec![1, 2, 3]);
    }

    #[test]
    fn test_sync_empty_diff_is_a_noop() {
        let source = posts_db(&[1]);
        let mut dest = posts_db(&[1]);

        let stats = sync_table_rows(
            &source,
            &mut dest,
            "posts",
            "id",
            &RowKeyDiff::default(),
            &RowSyncOptions::default(),
            &Quoter::default(),
        )
        .unwrap();

        assert_eq!(stats.rows_deleted, 0);
        assert_eq!(stats.rows_copied, 0);
    }

    #[test]
    fn test_sync_text_keys() {
        let source = Connection::open_in_memory().unwrap();
        source
            .execute_batch(
                "CREATE TABLE sequences (name TEXT PRIMARY KEY, value INTEGER);
                 INSERT INTO sequences VALUES ('users', 5), ('posts', 9);",
            )
            .unwrap();
        let mut dest = Connection::open_in_memory().unwrap();
        dest.execute_batch(
            "CREATE TABLE sequences (name TEXT PRIMARY KEY, value INTEGER);
             INSERT INTO sequences VALUES ('users', 3), ('stale', 1);",
        )
        .unwrap();

        let quoter = Quoter::default();
        let diff = diff_key_sets(
            &read_key_set(&source, "sequences", "name", &quoter).unwrap(),
            &read_key_set(&dest, "sequences", "name", &quoter).unwrap(),
        );

        sync_table_rows(
            &source,
            &mut dest,
            "sequences",
            "name",
            &diff,
            &RowSyncOptions::default(),
            &quoter,
        )
        .unwrap();

        let names: Vec<String> = {
            let mut stmt = dest
                .prepare("SELECT name FROM sequences ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<std::result::Result<_, _>>()
                .unwrap()
        };
        assert_eq!(names, vec!["posts", "users"]);
    }

    #[test]
    fn test_batch_failure_rolls_back_table() {
        let source = posts_db(&[1, 2]);
        // Destination is missing the body column, so copy-forward fails.
        let mut dest = Connection::open_in_memory().unwrap();
        dest.execute_batch(
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);
             INSERT INTO posts (id, title) VALUES (9, 'stale');",
        )
        .unwrap();

        let quoter = Quoter::default();
        let diff = diff_key_sets(
            &read_key_set(&source, "posts", "id", &quoter).unwrap(),
            &read_key_set(&dest, "posts", "id", &quoter).unwrap(),
        );

        let err = sync_table_rows(
            &source,
            &mut dest,
            "posts",
            "id",
            &diff,
            &RowSyncOptions::default(),
            &quoter,
        )
        .unwrap_err();

        match err {
            SyncError::RowSync { table, batch, .. } => {
                assert_eq!(table, "posts");
                assert!(batch > 0);
            }
            other => panic!("expected RowSync, got {:?}", other),
        }

        // The delete that preceded the failing copy was rolled back.
        assert_eq!(post_ids(&dest), vec![9]);
    }
}
