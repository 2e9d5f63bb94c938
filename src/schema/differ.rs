// ABOUTME: Schema differ - compares two schema snapshots into an ordered change list
// ABOUTME: Table entries recurse into field-level diffs keyed by column name

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::schema::{FieldDefinition, ObjectKind, SchemaObject, TableDefinition};

/// A single structural change needed to align the destination with the
/// source. Entries carry the full source object so applying them never
/// requires re-reading the source database.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDiffEntry {
    /// Present in source, absent in destination.
    Created(SchemaObject),
    /// Present in both but structurally different. Applied as a destructive
    /// drop-and-recreate; `field_diffs` describes the column-level changes
    /// for reporting (empty for non-table objects or unparsed definitions).
    Updated {
        object: SchemaObject,
        field_diffs: Vec<FieldDiffEntry>,
    },
    /// Present in destination, absent in source.
    Deleted { kind: ObjectKind, name: String },
}

impl SchemaDiffEntry {
    pub fn kind(&self) -> ObjectKind {
        match self {
            SchemaDiffEntry::Created(o) | SchemaDiffEntry::Updated { object: o, .. } => o.kind,
            SchemaDiffEntry::Deleted { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SchemaDiffEntry::Created(o) | SchemaDiffEntry::Updated { object: o, .. } => &o.name,
            SchemaDiffEntry::Deleted { name, .. } => name,
        }
    }
}

impl fmt::Display for SchemaDiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDiffEntry::Created(o) => write!(f, "create {} {}", o.kind, o.name),
            SchemaDiffEntry::Updated { object, .. } => {
                write!(f, "rebuild {} {}", object.kind, object.name)
            }
            SchemaDiffEntry::Deleted { kind, name } => write!(f, "drop {} {}", kind, name),
        }
    }
}

/// A column-level change within an updated table.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDiffEntry {
    AddColumn(FieldDefinition),
    AlterColumn(FieldDefinition),
    DropColumn(String),
}

impl fmt::Display for FieldDiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDiffEntry::AddColumn(field) => write!(f, "add column {}", field.name),
            FieldDiffEntry::AlterColumn(field) => write!(f, "alter column {}", field.name),
            FieldDiffEntry::DropColumn(name) => write!(f, "drop column {}", name),
        }
    }
}

/// Compare two schema snapshots.
///
/// Derived purely from the two snapshots: entries for created and updated
/// objects come out in source scan order, entries for deleted objects in
/// destination scan order. With the deterministic ordering the reader
/// provides, diffing the same pair twice yields the same list.
pub fn diff_schemas(source: &[SchemaObject], dest: &[SchemaObject]) -> Vec<SchemaDiffEntry> {
    let dest_by_identity: HashMap<(ObjectKind, &str), &SchemaObject> =
        dest.iter().map(|o| (o.identity(), o)).collect();
    let source_identities: HashSet<(ObjectKind, &str)> =
        source.iter().map(|o| o.identity()).collect();

    let mut entries = Vec::new();

    for src in source {
        match dest_by_identity.get(&src.identity()) {
            None => entries.push(SchemaDiffEntry::Created(src.clone())),
            Some(dst) if !src.structurally_equal(dst) => {
                let field_diffs = match (&src.table, &dst.table) {
                    (Some(s), Some(d)) => diff_fields(s, d),
                    _ => Vec::new(),
                };
                entries.push(SchemaDiffEntry::Updated {
                    object: src.clone(),
                    field_diffs,
                });
            }
            Some(_) => {}
        }
    }

    for dst in dest {
        if !source_identities.contains(&dst.identity()) {
            entries.push(SchemaDiffEntry::Deleted {
                kind: dst.kind,
                name: dst.name.clone(),
            });
        }
    }

    entries
}

/// Field-level diff between two table definitions, keyed by column name.
///
/// Fields are compared with nullability normalized away: a column whose only
/// difference is NULL-ness produces no entry.
pub fn diff_fields(source: &TableDefinition, dest: &TableDefinition) -> Vec<FieldDiffEntry> {
    let dest_by_name: HashMap<&str, &FieldDefinition> =
        dest.fields.iter().map(|f| (f.name.as_str(), f)).collect();
    let source_names: HashSet<&str> = source.fields.iter().map(|f| f.name.as_str()).collect();

    let mut diffs = Vec::new();

    for field in &source.fields {
        match dest_by_name.get(field.name.as_str()) {
            None => diffs.push(FieldDiffEntry::AddColumn(field.clone())),
            Some(existing) if !field.same_shape(existing) => {
                diffs.push(FieldDiffEntry::AlterColumn(field.clone()));
            }
            Some(_) => {}
        }
    }

    for field in &dest.fields {
        if !source_names.contains(field.name.as_str()) {
            diffs.push(FieldDiffEntry::DropColumn(field.name.clone()));
        }
    }

    diffs
}
