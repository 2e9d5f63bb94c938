// ABOUTME: Table exporter - streams rows to newline-delimited JSON snapshot files
// ABOUTME: One positional JSON array per row, progress reported at whole-percent steps

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::error::{ExportError, Result, SyncError};
use crate::quoting::Quoter;

/// Receives completion updates while a table streams out.
///
/// Reporting cadence is a UX concern, not a correctness one: the exporter
/// calls `advance` only when the whole-percent completion figure changes, so
/// a sink sees at most 100 updates per table regardless of row count.
pub trait ProgressSink {
    fn begin(&mut self, table: &str, total_rows: u64);
    fn advance(&mut self, rows_done: u64);
    fn finish(&mut self);
}

/// Console sink: a single overwritable progress line per table.
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ConsoleProgress {
    fn begin(&mut self, table: &str, total_rows: u64) {
        let bar = ProgressBar::new(total_rows);
        bar.set_style(ProgressStyle::default_bar());
        bar.set_message(table.to_string());
        self.bar = Some(bar);
    }

    fn advance(&mut self, rows_done: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(rows_done);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Sink that swallows updates. Useful for callers that log instead.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn begin(&mut self, _table: &str, _total_rows: u64) {}
    fn advance(&mut self, _rows_done: u64) {}
    fn finish(&mut self) {}
}

/// Stream every row of `table` to `<dir>/<table>`.
///
/// The output is UTF-8 text: one JSON array per row holding the column
/// values in result-column order, a newline after each record, no header and
/// no completion marker. The file is created fresh (truncated) on every run;
/// this is a full dump, not an incremental append.
///
/// A mid-stream failure leaves a partial file that is indistinguishable from
/// a short complete one. Callers must treat any export that did not return
/// successfully as invalid in its entirety and re-export from scratch.
///
/// Returns the number of rows written.
pub fn export_table(
    conn: &Connection,
    table: &str,
    dir: &Path,
    quoter: &Quoter,
    progress: &mut dyn ProgressSink,
) -> Result<u64> {
    let fail = |source: ExportError| SyncError::Export {
        table: table.to_string(),
        source,
    };

    let total = count_rows(conn, table, quoter).map_err(|e| fail(e.into()))?;
    tracing::info!("Exporting {} row(s) from table '{}'", total, table);

    let path = dir.join(table);
    let file = File::create(&path).map_err(|e| fail(e.into()))?;
    let mut writer = BufWriter::new(file);

    progress.begin(table, total);

    let query = format!("SELECT * FROM {}", quoter.ident(table));
    let mut stmt = conn.prepare(&query).map_err(|e| fail(e.into()))?;
    let column_count = stmt.column_count();

    let mut rows = stmt.query([]).map_err(|e| fail(e.into()))?;
    let mut done = 0u64;
    let mut last_percent = 0u64;

    while let Some(row) = rows.next().map_err(|e| fail(e.into()))? {
        let mut record = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            let value: Value = row.get(idx).map_err(|e| fail(e.into()))?;
            record.push(value_to_json(&value));
        }

        serde_json::to_writer(&mut writer, &JsonValue::Array(record))
            .map_err(|e| fail(e.into()))?;
        writer.write_all(b"\n").map_err(|e| fail(e.into()))?;

        done += 1;
        if total > 0 {
            let percent = done * 100 / total;
            if percent > last_percent {
                last_percent = percent;
                progress.advance(done);
            }
        }
    }

    writer.flush().map_err(|e| fail(e.into()))?;
    progress.finish();

    tracing::info!("Exported {} row(s) to {}", done, path.display());

    Ok(done)
}

fn count_rows(conn: &Connection, table: &str, quoter: &Quoter) -> rusqlite::Result<u64> {
    let query = format!("SELECT COUNT(*) FROM {}", quoter.ident(table));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Map a SQLite value to JSON losslessly.
///
/// INTEGER and finite REAL become numbers; non-finite reals become strings
/// since JSON cannot represent them; TEXT becomes a string; BLOB becomes a
/// tagged object with base64 data so it stays distinguishable from text.
fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::Number((*i).into()),
        Value::Real(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => JsonValue::String(f.to_string()),
        },
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Blob(b) => {
            let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b);
            serde_json::json!({
                "_type": "blob",
                "data": encoded
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Records every sink call for assertions.
    #[derive(Default)]
    struct RecordingProgress {
        began: Option<(String, u64)>,
        advances: Vec<u64>,
        finished: bool,
    }

    impl ProgressSink for RecordingProgress {
        fn begin(&mut self, table: &str, total_rows: u64) {
            self.began = Some((table.to_string(), total_rows));
        }
        fn advance(&mut self, rows_done: u64) {
            self.advances.push(rows_done);
        }
        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn users_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, balance REAL);
             INSERT INTO users VALUES (1, 'Alice', 10.5);
             INSERT INTO users VALUES (2, 'Bob', NULL);
             INSERT INTO users VALUES (3, NULL, 0.0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_export_writes_one_line_per_row() {
        let conn = users_db();
        let dir = tempfile::tempdir().unwrap();
        let mut progress = RecordingProgress::default();

        let written =
            export_table(&conn, "users", dir.path(), &Quoter::default(), &mut progress).unwrap();
        assert_eq!(written, 3);

        let content = fs::read_to_string(dir.path().join("users")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(content.ends_with('\n'));

        // Positional values in declared column order.
        assert_eq!(lines[0], "[1,\"Alice\",10.5]");
        assert_eq!(lines[1], "[2,\"Bob\",null]");
        assert_eq!(lines[2], "[3,null,0.0]");
    }

    #[test]
    fn test_export_truncates_previous_file() {
        let conn = users_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users");
        fs::write(&path, "stale content from an earlier run\n".repeat(100)).unwrap();

        export_table(
            &conn,
            "users",
            dir.path(),
            &Quoter::default(),
            &mut SilentProgress,
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(!content.contains("stale"));
    }

    #[test]
    fn test_export_empty_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE empty (id INTEGER)", []).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let written = export_table(
            &conn,
            "empty",
            dir.path(),
            &Quoter::default(),
            &mut SilentProgress,
        )
        .unwrap();
        assert_eq!(written, 0);

        let content = fs::read_to_string(dir.path().join("empty")).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_export_blob_values() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE files (id INTEGER, data BLOB)", [])
            .unwrap();
        conn.execute(
            "INSERT INTO files VALUES (1, ?1)",
            [Value::Blob(vec![0x01, 0x02, 0xff])],
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();

        export_table(
            &conn,
            "files",
            dir.path(),
            &Quoter::default(),
            &mut SilentProgress,
        )
        .unwrap();

        let content = fs::read_to_string(dir.path().join("files")).unwrap();
        let parsed: JsonValue = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed[1]["_type"], "blob");
        let decoded = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            parsed[1]["data"].as_str().unwrap(),
        )
        .unwrap();
        assert_eq!(decoded, vec![0x01, 0x02, 0xff]);
    }

    #[test]
    fn test_export_progress_reporting() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE big (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        for i in 1..=400 {
            conn.execute("INSERT INTO big (id) VALUES (?1)", [i]).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let mut progress = RecordingProgress::default();

        export_table(&conn, "big", dir.path(), &Quoter::default(), &mut progress).unwrap();

        assert_eq!(progress.began, Some(("big".to_string(), 400)));
        assert!(progress.finished);
        // Whole-percent steps only: at most 100 updates for 400 rows.
        assert_eq!(progress.advances.len(), 100);
        assert_eq!(*progress.advances.last().unwrap(), 400);
    }

    #[test]
    fn test_value_to_json_non_finite_real() {
        assert_eq!(
            value_to_json(&Value::Real(f64::NAN)),
            JsonValue::String("NaN".to_string())
        );
        assert_eq!(
            value_to_json(&Value::Real(f64::INFINITY)),
            JsonValue::String("inf".to_string())
        );
    }

    #[test]
    fn test_export_missing_table_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = export_table(
            &conn,
            "nope",
            dir.path(),
            &Quoter::default(),
            &mut SilentProgress,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Export { table, .. } if table == "nope"));
    }
}
