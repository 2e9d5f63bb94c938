// ABOUTME: Row identity model - opaque row keys, key set diffs, key column policy
// ABOUTME: Keys hash and compare by value so sets work for integer, text and blob keys alike

pub mod applier;
pub mod differ;
pub mod reader;

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// The value identifying one row within a table.
///
/// Keys are opaque scalars: commonly integers, but table-specific (a
/// sequence-tracking table keys on a name, for example). Equality and
/// hashing are defined for every variant so key sets can be compared with
/// hash-set membership; reals hash by bit pattern.
#[derive(Debug, Clone)]
pub enum RowKey {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowKey::Integer(a), RowKey::Integer(b)) => a == b,
            (RowKey::Real(a), RowKey::Real(b)) => a.to_bits() == b.to_bits(),
            (RowKey::Text(a), RowKey::Text(b)) => a == b,
            (RowKey::Blob(a), RowKey::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for RowKey {}

impl Hash for RowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            RowKey::Integer(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            RowKey::Real(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
            RowKey::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            RowKey::Blob(b) => {
                3u8.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Integer(i) => write!(f, "{}", i),
            RowKey::Real(r) => write!(f, "{}", r),
            RowKey::Text(s) => write!(f, "{}", s),
            RowKey::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl FromSql for RowKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(i) => Ok(RowKey::Integer(i)),
            ValueRef::Real(f) => Ok(RowKey::Real(f)),
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(s) => Ok(RowKey::Text(s.to_string())),
                Err(e) => Err(FromSqlError::Other(Box::new(e))),
            },
            ValueRef::Blob(b) => Ok(RowKey::Blob(b.to_vec())),
            // A key column holding NULL cannot identify a row.
            ValueRef::Null => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for RowKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            RowKey::Integer(i) => ToSqlOutput::from(*i),
            RowKey::Real(f) => ToSqlOutput::from(*f),
            RowKey::Text(s) => ToSqlOutput::from(s.as_str()),
            RowKey::Blob(b) => ToSqlOutput::from(b.as_slice()),
        })
    }
}

/// Symmetric difference between a source and a destination key set.
///
/// `created` holds keys present in source but absent in destination;
/// `deleted` holds keys present in destination but absent in source. The two
/// never intersect, and together with the shared remainder they partition
/// the union of both sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowKeyDiff {
    pub created: Vec<RowKey>,
    pub deleted: Vec<RowKey>,
}

impl RowKeyDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Selects the identity column for a table.
///
/// Defaults to `id`, with built-in overrides for the well-known special
/// tables (`sequences` keys on `name`, `locks` keys on `index`). Callers
/// layer their own overrides on top via config or flags.
#[derive(Debug, Clone)]
pub struct KeyColumnPolicy {
    overrides: HashMap<String, String>,
}

impl Default for KeyColumnPolicy {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        overrides.insert("sequences".to_string(), "name".to_string());
        overrides.insert("locks".to_string(), "index".to_string());
        Self { overrides }
    }
}

impl KeyColumnPolicy {
    pub const DEFAULT_COLUMN: &'static str = "id";

    /// The identity column for `table`.
    pub fn key_column(&self, table: &str) -> &str {
        self.overrides
            .get(table)
            .map(String::as_str)
            .unwrap_or(Self::DEFAULT_COLUMN)
    }

    /// Add or replace an override. Later calls win, so caller-supplied
    /// overrides shadow the built-ins.
    pub fn set_override(&mut self, table: impl Into<String>, column: impl Into<String>) {
        self.overrides.insert(table.into(), column.into());
    }
}
