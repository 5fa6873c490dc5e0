//! Load the embedded catalog and resolve it into the runtime entity model.

use crate::config::resolved::{
    ColumnInfo, ColumnKind, IncludeDirection, IncludeSpec, ReferenceSpec, ResolvedEntity, ResolvedModel,
};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;

const SCHEMAS_JSON: &str = include_str!("../../catalog/schemas.json");
const ENUMS_JSON: &str = include_str!("../../catalog/enums.json");
const TABLES_JSON: &str = include_str!("../../catalog/tables.json");
const COLUMNS_JSON: &str = include_str!("../../catalog/columns.json");
const INDEXES_JSON: &str = include_str!("../../catalog/indexes.json");
const RELATIONSHIPS_JSON: &str = include_str!("../../catalog/relationships.json");
const API_ENTITIES_JSON: &str = include_str!("../../catalog/api_entities.json");

fn parse<T>(file: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("{}: {}", file, e)))
}

/// Parse the catalog compiled into the binary from `catalog/*.json`.
pub fn load_embedded() -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        schemas: parse("schemas.json", SCHEMAS_JSON)?,
        enums: parse("enums.json", ENUMS_JSON)?,
        tables: parse("tables.json", TABLES_JSON)?,
        columns: parse("columns.json", COLUMNS_JSON)?,
        indexes: parse("indexes.json", INDEXES_JSON)?,
        relationships: parse("relationships.json", RELATIONSHIPS_JSON)?,
        api_entities: parse("api_entities.json", API_ENTITIES_JSON)?,
    })
}

/// Quote identifier for PostgreSQL (identifiers come from the catalog only).
pub(crate) fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let enums_by_name: HashMap<_, _> = config.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> =
        config.columns.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
    let api_by_table: HashMap<&str, &ApiEntityConfig> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api))
        .collect();

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let pk_names: Vec<String> = table.primary_key.columns().into_iter().map(String::from).collect();

        let mut columns = Vec::with_capacity(table_columns.len());
        for c in table_columns {
            let base = c.type_.base_name();
            let enum_cfg = enums_by_name.get(base);
            let kind = match base {
                "serial" | "integer" => ColumnKind::Integer,
                "boolean" => ColumnKind::Boolean,
                "timestamp" => ColumnKind::Timestamp,
                _ if enum_cfg.is_some() => ColumnKind::Enum,
                _ => ColumnKind::Text,
            };
            let pg_type = match (kind, enum_cfg) {
                (ColumnKind::Enum, Some(e)) => {
                    let enum_sid = e.schema_id.as_deref().unwrap_or(default_sid);
                    let enum_schema = schemas_by_id.get(enum_sid).map(|s| s.name.as_str()).unwrap_or("public");
                    format!("{}.{}", quote_ident(enum_schema), quote_ident(&e.name))
                }
                (ColumnKind::Integer, _) => "integer".to_string(),
                (ColumnKind::Boolean, _) => "boolean".to_string(),
                (ColumnKind::Timestamp, _) => "timestamp".to_string(),
                _ => "text".to_string(),
            };
            columns.push(ColumnInfo {
                name: c.name.clone(),
                kind,
                is_pk: pk_names.contains(&c.name),
                nullable: c.nullable,
                has_default: base == "serial" || c.default.is_some(),
                pg_type,
            });
        }

        let pk_serial = pk_names.len() == 1
            && table_columns
                .iter()
                .any(|c| c.name == pk_names[0] && c.type_.base_name() == "serial");

        let mut validation: HashMap<String, ValidationRule> = HashMap::new();
        for c in table_columns {
            if pk_serial && c.name == pk_names[0] {
                continue;
            }
            let info = columns.iter().find(|i| i.name == c.name);
            let required = info.map(|i| !i.nullable && !i.has_default).unwrap_or(false);
            let allowed = enums_by_name.get(c.type_.base_name()).map(|e| {
                e.values
                    .iter()
                    .map(|v| serde_json::Value::String(v.clone()))
                    .collect::<Vec<_>>()
            });
            let max_length = if c.type_.base_name() == "varchar" {
                c.type_.first_param()
            } else {
                None
            };
            let mut rule = ValidationRule {
                required: Some(required),
                max_length,
                allowed,
                ..Default::default()
            };
            if let Some(extra) = api.validation.get(&c.name) {
                merge_rule(&mut rule, extra);
            }
            validation.insert(c.name.clone(), rule);
        }

        let unique_columns = table
            .unique
            .iter()
            .filter(|u| u.len() == 1)
            .map(|u| u[0].clone())
            .collect();

        let references = config
            .relationships
            .iter()
            .filter(|r| r.from_table_id == table.id)
            .filter_map(|r| {
                let column = column_id_to_name.get(r.from_column_id.as_str())?;
                let related_column = column_id_to_name.get(r.to_column_id.as_str())?;
                let related = api_by_table.get(r.to_table_id.as_str())?;
                let to_table = tables_by_id.get(r.to_table_id.as_str())?;
                let to_sid = to_table.schema_id.as_deref().unwrap_or(default_sid);
                let to_schema = schemas_by_id.get(to_sid)?;
                Some(ReferenceSpec {
                    column: column.to_string(),
                    related_path_segment: related.path_segment.clone(),
                    related_label: related.label.clone(),
                    related_table: format!("{}.{}", quote_ident(&to_schema.name), quote_ident(&to_table.name)),
                    related_column: related_column.to_string(),
                })
            })
            .collect();

        let includes = build_includes_for_table(&table.id, &config.relationships, &column_id_to_name, &api_by_table)?;

        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            label: api.label.clone(),
            pk_columns: pk_names,
            pk_serial,
            columns,
            operations: api.operations.clone(),
            filters: api.filters.clone(),
            references,
            unique_columns,
            includes,
            validation,
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}

fn merge_rule(rule: &mut ValidationRule, extra: &ValidationRule) {
    if extra.required.is_some() {
        rule.required = extra.required;
    }
    if extra.max_length.is_some() {
        rule.max_length = extra.max_length;
    }
    if extra.min_length.is_some() {
        rule.min_length = extra.min_length;
    }
    if extra.allowed.is_some() {
        rule.allowed = extra.allowed.clone();
    }
    if extra.minimum.is_some() {
        rule.minimum = extra.minimum;
    }
    if extra.maximum.is_some() {
        rule.maximum = extra.maximum;
    }
}

fn build_includes_for_table(
    our_table_id: &str,
    relationships: &[RelationshipConfig],
    column_id_to_name: &HashMap<&str, &str>,
    api_by_table: &HashMap<&str, &ApiEntityConfig>,
) -> Result<Vec<IncludeSpec>, ConfigError> {
    let mut includes: Vec<IncludeSpec> = Vec::new();
    for rel in relationships {
        let (Some(from_col), Some(to_col)) = (
            column_id_to_name.get(rel.from_column_id.as_str()),
            column_id_to_name.get(rel.to_column_id.as_str()),
        ) else {
            continue;
        };
        if rel.from_table_id == our_table_id {
            if let Some(related) = api_by_table.get(rel.to_table_id.as_str()) {
                includes.push(IncludeSpec {
                    name: from_col.strip_suffix("_id").unwrap_or(from_col).to_string(),
                    direction: IncludeDirection::ToOne,
                    related_path_segment: related.path_segment.clone(),
                    our_key_column: from_col.to_string(),
                    their_key_column: to_col.to_string(),
                });
            }
        }
        if rel.to_table_id == our_table_id {
            if let Some(related) = api_by_table.get(rel.from_table_id.as_str()) {
                includes.push(IncludeSpec {
                    name: related.path_segment.clone(),
                    direction: IncludeDirection::ToMany,
                    related_path_segment: related.path_segment.clone(),
                    our_key_column: to_col.to_string(),
                    their_key_column: from_col.to_string(),
                });
            }
        }
    }
    let mut seen = std::collections::HashSet::new();
    for inc in &includes {
        if !seen.insert(inc.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "table {} has two relations named '{}'",
                our_table_id, inc.name
            )));
        }
    }
    Ok(includes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ResolvedModel {
        resolve(&load_embedded().unwrap()).unwrap()
    }

    #[test]
    fn resolves_every_api_entity() {
        let m = model();
        assert_eq!(m.entities.len(), 17);
        for path in ["characters", "blocks", "side-quests", "character-status-effects", "quest-characters"] {
            assert!(m.entity_by_path(path).is_some(), "missing {}", path);
        }
    }

    #[test]
    fn serial_keys_and_shared_keys() {
        let m = model();
        assert!(m.entity_by_path("characters").unwrap().pk_serial);
        let playable = m.entity_by_path("playable-characters").unwrap();
        assert!(!playable.pk_serial);
        assert_eq!(playable.pk(), "character_id");
        let joined = m.entity_by_path("character-status-effects").unwrap();
        assert!(joined.has_composite_pk());
        assert!(!joined.allows("read"));
    }

    #[test]
    fn derives_validation_from_columns() {
        let m = model();
        let enemies = m.entity_by_path("enemies").unwrap();
        let hp = &enemies.validation["hp"];
        assert_eq!(hp.required, Some(true));
        assert_eq!(hp.minimum, Some(1.0));
        assert_eq!(enemies.validation["card_score"].required, Some(false));
        assert!(!enemies.validation.contains_key("enemy_id"));

        let characters = m.entity_by_path("characters").unwrap();
        assert_eq!(characters.validation["name"].max_length, Some(100));

        let blocks = m.entity_by_path("blocks").unwrap();
        let allowed = blocks.validation["block_type"].allowed.as_ref().unwrap();
        assert_eq!(allowed.len(), 4);
        assert_eq!(blocks.column("block_type").unwrap().pg_type, "\"public\".\"block_type\"");
        assert_eq!(blocks.column("location_id").unwrap().pg_type, "integer");
    }

    #[test]
    fn builds_references_and_includes() {
        let m = model();
        let bosses = m.entity_by_path("bosses").unwrap();
        let refs: Vec<_> = bosses.references.iter().map(|r| r.column.as_str()).collect();
        assert_eq!(refs, vec!["character_id", "chapter_id"]);
        assert_eq!(bosses.include("character").unwrap().direction, IncludeDirection::ToOne);

        let chapters = m.entity_by_path("chapters").unwrap();
        let locations = chapters.include("locations").unwrap();
        assert_eq!(locations.direction, IncludeDirection::ToMany);
        assert_eq!(locations.their_key_column, "chapter_id");
        assert!(chapters.include("pixls").is_some());

        let blocks = m.entity_by_path("blocks").unwrap();
        assert_eq!(blocks.include("contains_item").unwrap().related_path_segment, "items");
    }

    #[test]
    fn unique_columns_come_from_single_column_constraints() {
        let m = model();
        assert_eq!(m.entity_by_path("items").unwrap().unique_columns, vec!["name".to_string()]);
        assert!(m.entity_by_path("locations").unwrap().unique_columns.is_empty());
    }
}
