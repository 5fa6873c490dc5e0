//! Catalog validation: referential integrity and API consistency.

use crate::config::FullConfig;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Path segments owned by fixed routers; an entity may not claim them.
pub const RESERVED_PATH_SEGMENTS: &[&str] = &["procedures", "views", "queries", "health", "ready", "version"];

/// Column base types the migration knows how to emit (enums are accepted by name).
pub const KNOWN_COLUMN_TYPES: &[&str] = &["serial", "integer", "boolean", "text", "varchar", "timestamp"];

pub const KNOWN_OPERATIONS: &[&str] = &["list", "read", "create", "update", "delete"];

/// Default schema id when catalog entries omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let enum_names: HashSet<&str> = config.enums.iter().map(|e| e.name.as_str()).collect();
    let column_table: HashMap<&str, &str> = config
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c.table_id.as_str()))
        .collect();
    let columns_of = |table_id: &str| -> HashSet<&str> {
        config
            .columns
            .iter()
            .filter(|c| c.table_id == table_id)
            .map(|c| c.name.as_str())
            .collect()
    };

    for e in &config.enums {
        let sid = e.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        if e.values.is_empty() {
            return Err(ConfigError::Validation(format!("enum {} has no values", e.name)));
        }
    }

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        let table_columns = columns_of(&t.id);
        for pk in t.primary_key.columns() {
            if !table_columns.contains(pk) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table_id: t.id.clone(),
                    column: pk.to_string(),
                });
            }
        }
        for col in t.unique.iter().flatten() {
            if !table_columns.contains(col.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "unique column",
                    id: format!("{}.{}", t.id, col),
                });
            }
        }
    }

    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        let base = c.type_.base_name();
        if !KNOWN_COLUMN_TYPES.contains(&base) && !enum_names.contains(base) {
            return Err(ConfigError::Validation(format!("column {} has unknown type {}", c.id, base)));
        }
    }

    for idx in &config.indexes {
        if !table_ids.contains(idx.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: idx.table_id.clone(),
            });
        }
        let table_columns = columns_of(&idx.table_id);
        if let Some(col) = idx.columns.iter().find(|c| !table_columns.contains(c.as_str())) {
            return Err(ConfigError::MissingReference {
                kind: "index column",
                id: format!("{}.{}", idx.name, col),
            });
        }
    }

    for r in &config.relationships {
        let from_ok = column_table.get(r.from_column_id.as_str()) == Some(&r.from_table_id.as_str());
        let to_ok = column_table.get(r.to_column_id.as_str()) == Some(&r.to_table_id.as_str());
        if !table_ids.contains(r.from_table_id.as_str())
            || !table_ids.contains(r.to_table_id.as_str())
            || !from_ok
            || !to_ok
        {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if RESERVED_PATH_SEGMENTS.contains(&api.path_segment.as_str()) {
            return Err(ConfigError::Validation(format!(
                "path segment '{}' is reserved",
                api.path_segment
            )));
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        if let Some(op) = api.operations.iter().find(|o| !KNOWN_OPERATIONS.contains(&o.as_str())) {
            return Err(ConfigError::Validation(format!(
                "{}: unknown operation '{}'",
                api.path_segment, op
            )));
        }
        let table_columns = columns_of(&api.entity_id);
        for f in &api.filters {
            if !table_columns.contains(f.column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "filter column",
                    id: format!("{}.{}", api.path_segment, f.column),
                });
            }
        }
        if let Some(col) = api.validation.keys().find(|k| !table_columns.contains(k.as_str())) {
            return Err(ConfigError::MissingReference {
                kind: "validation column",
                id: format!("{}.{}", api.path_segment, col),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_embedded;

    #[test]
    fn embedded_catalog_is_valid() {
        let config = load_embedded().expect("embedded catalog parses");
        validate(&config).expect("embedded catalog validates");
    }

    #[test]
    fn rejects_reserved_path_segment() {
        let mut config = load_embedded().unwrap();
        config.api_entities[0].path_segment = "views".into();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut config = load_embedded().unwrap();
        let dup = config.api_entities[0].path_segment.clone();
        config.api_entities[1].path_segment = dup;
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn rejects_relationship_with_column_from_other_table() {
        let mut config = load_embedded().unwrap();
        config.relationships[0].from_column_id = "items.item_id".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "relationship", .. })
        ));
    }

    #[test]
    fn rejects_unknown_column_type() {
        let mut config = load_embedded().unwrap();
        config.columns[1].type_ = crate::config::ColumnTypeConfig::Simple("money".into());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
