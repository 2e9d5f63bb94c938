// ABOUTME: Structural schema model - objects, table definitions, field definitions
// ABOUTME: Equality policy lives here: order-sensitive fields, nullability normalized away

pub mod applier;
pub mod differ;
pub mod parser;
pub mod reader;

use std::fmt;

/// The kinds of schema objects the engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Table,
    Index,
}

impl ObjectKind {
    /// The `type` value used by `sqlite_master`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
        }
    }

    /// The keyword used in `DROP` statements.
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::Index => "INDEX",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named schema object with its defining statement text.
///
/// Identity is `(kind, name)`. For tables the defining text is additionally
/// parsed into a [`TableDefinition`] when possible, which enables field-level
/// diffing; objects that fail to parse fall back to normalized-text equality.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaObject {
    pub kind: ObjectKind,
    pub name: String,
    /// Defining statement text as stored by `sqlite_master`.
    pub sql: String,
    /// Parsed table definition, tables only.
    pub table: Option<TableDefinition>,
}

impl SchemaObject {
    pub fn identity(&self) -> (ObjectKind, &str) {
        (self.kind, &self.name)
    }

    /// Structural equality between two objects of the same identity.
    ///
    /// When both sides carry a parsed table definition the comparison is
    /// field-by-field (order-sensitive, nullability ignored). Otherwise it
    /// falls back to whitespace-normalized definition text.
    pub fn structurally_equal(&self, other: &SchemaObject) -> bool {
        match (&self.table, &other.table) {
            (Some(a), Some(b)) => a.structurally_equal(b),
            _ => normalize_sql(&self.sql) == normalize_sql(&other.sql),
        }
    }
}

/// A parsed table definition: name plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl TableDefinition {
    /// Order-sensitive structural equality. Reordering columns counts as a
    /// change even when the field set is identical.
    pub fn structurally_equal(&self, other: &TableDefinition) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.same_shape(b))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    /// Declared type text, e.g. `INTEGER` or `VARCHAR(255)`. May be empty:
    /// SQLite permits typeless columns.
    pub type_name: String,
    pub nullable: bool,
    /// Default value text exactly as written in the definition.
    pub default: Option<String>,
    /// Residual constraint text, e.g. `PRIMARY KEY AUTOINCREMENT` or
    /// `REFERENCES users(id)`.
    pub constraints: String,
}

impl FieldDefinition {
    /// Compare every attribute except nullability.
    ///
    /// Nullability is normalized away so that differences in how the two
    /// sides infer or declare NULL-ness never cause a spurious column
    /// rebuild on every run.
    pub fn same_shape(&self, other: &FieldDefinition) -> bool {
        self.name == other.name
            && self.type_name.eq_ignore_ascii_case(&other.type_name)
            && self.default == other.default
            && self.constraints.eq_ignore_ascii_case(&other.constraints)
    }
}

/// Collapse whitespace runs and strip a trailing semicolon so cosmetic
/// formatting differences do not register as structural changes.
pub fn normalize_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches(';').trim().to_string()
}
