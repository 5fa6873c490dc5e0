//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{FilterConfig, ValidationRule};
use std::collections::HashMap;

/// Direction of a related-include: to_one (we have FK to them) or to_many (they have FK to us).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// A related entity reachable through one foreign key.
/// To-one includes are named after the FK column without `_id` (`character`, `unlock_chapter`);
/// to-many includes after the child's path segment (`locations`, `blocks`).
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    pub name: String,
    pub direction: IncludeDirection,
    pub related_path_segment: String,
    /// Our column used in the join (our FK for to_one; our PK for to_many).
    pub our_key_column: String,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub their_key_column: String,
}

/// Foreign key checked before writes so a dangling id becomes a 404 instead of a constraint error.
#[derive(Clone, Debug)]
pub struct ReferenceSpec {
    pub column: String,
    pub related_path_segment: String,
    pub related_label: String,
    /// Quoted `schema.table` of the referenced table.
    pub related_table: String,
    pub related_column: String,
}

/// Value shape of a column, used for request validation and query-string coercion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Boolean,
    Text,
    Timestamp,
    Enum,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub is_pk: bool,
    pub nullable: bool,
    /// Serial or DB default: may be omitted on insert.
    pub has_default: bool,
    /// Cast applied to every bound parameter (`$1::integer`, `$1::"public"."block_type"`).
    pub pg_type: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub label: String,
    pub pk_columns: Vec<String>,
    /// Single generated key: ids are never accepted from request bodies.
    pub pk_serial: bool,
    pub columns: Vec<ColumnInfo>,
    pub operations: Vec<String>,
    pub filters: Vec<FilterConfig>,
    pub references: Vec<ReferenceSpec>,
    /// Single-column unique constraints, pre-checked on create.
    pub unique_columns: Vec<String>,
    pub includes: Vec<IncludeSpec>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk(&self) -> &str {
        &self.pk_columns[0]
    }

    pub fn has_composite_pk(&self) -> bool {
        self.pk_columns.len() > 1
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
