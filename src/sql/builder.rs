//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from resolved entity.

use crate::config::{ColumnInfo, ColumnKind, FilterOp, IncludeDirection, ReferenceSpec, ResolvedEntity};
use serde_json::Value;
use std::collections::HashMap;

/// Hard ceiling on `LIMIT` for list queries.
pub const MAX_LIMIT: u32 = 1000;

/// Describes one include for single-query list: name, direction, related entity, our key column, their key column.
pub struct IncludeSelect<'a> {
    pub name: &'a str,
    pub direction: IncludeDirection,
    pub related: &'a ResolvedEntity,
    pub our_key: &'a str,
    pub their_key: &'a str,
}

/// One WHERE condition on a list query. Column names are checked against the entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        Filter {
            column: column.into(),
            op: FilterOp::Eq,
            value,
        }
    }
}

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder cast to the column type.
    fn push_param(&mut self, column: &ColumnInfo, v: Value) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), column.pg_type)
    }
}

/// Column expression for SELECT lists: enums come back as text so rows decode without custom types.
fn column_expr(c: &ColumnInfo, alias: Option<&str>) -> String {
    let q = quoted(&c.name);
    let qualified = match alias {
        Some(a) => format!("{}.{}", a, q),
        None => q.clone(),
    };
    match (c.kind, alias) {
        (ColumnKind::Enum, _) => format!("{}::text AS {}", qualified, q),
        (_, Some(_)) => format!("{} AS {}", qualified, q),
        (_, None) => qualified,
    }
}

pub fn select_column_list(entity: &ResolvedEntity) -> String {
    select_column_list_as(entity, None)
}

fn select_column_list_as(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| column_expr(c, alias))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk_column(entity: &ResolvedEntity) -> Option<&ColumnInfo> {
    entity.column(entity.pk())
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn push_filters(q: &mut QueryBuf, entity: &ResolvedEntity, filters: &[Filter], alias: &str) -> Vec<String> {
    let mut where_parts = Vec::new();
    for f in filters {
        let Some(c) = entity.column(&f.column) else { continue };
        let lhs = format!("{}.{}", alias, quoted(&c.name));
        let part = match f.op {
            FilterOp::NotNull => {
                if f.value.as_bool().unwrap_or(true) {
                    format!("{} IS NOT NULL", lhs)
                } else {
                    format!("{} IS NULL", lhs)
                }
            }
            FilterOp::Eq => format!("{} = {}", lhs, q.push_param(c, f.value.clone())),
            FilterOp::Gte => format!("{} >= {}", lhs, q.push_param(c, f.value.clone())),
            FilterOp::Lte => format!("{} <= {}", lhs, q.push_param(c, f.value.clone())),
        };
        where_parts.push(part);
    }
    where_parts
}

/// SELECT by primary key (single column PK only). Caller adds id as sole param.
pub fn select_by_id(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = pk_column(entity).map(|c| c.pg_type.as_str()).unwrap_or("integer");
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1::{}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(entity.pk()),
        cast
    );
    q
}

/// SELECT list in a single query: main table aliased as "main", each include as a scalar subquery
/// (json_agg for to_many, row_to_json for to_one). Ordered by the primary key columns.
pub fn select_list(
    entity: &ResolvedEntity,
    filters: &[Filter],
    limit: Option<u32>,
    offset: u32,
    includes: &[IncludeSelect<'_>],
) -> QueryBuf {
    const MAIN_ALIAS: &str = "main";
    let mut q = QueryBuf::new();

    let mut select_parts = vec![select_column_list_as(entity, Some(MAIN_ALIAS))];
    for inc in includes {
        let rel_cols = select_column_list(inc.related);
        let sub_from = format!(
            "{} WHERE {} = {}.{}",
            qualified_table(inc.related),
            quoted(inc.their_key),
            MAIN_ALIAS,
            quoted(inc.our_key)
        );
        let subquery = match inc.direction {
            IncludeDirection::ToOne => format!("(SELECT row_to_json(sub) FROM (SELECT {} FROM {}) sub)", rel_cols, sub_from),
            IncludeDirection::ToMany => format!(
                "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {}) sub)",
                rel_cols, sub_from
            ),
        };
        select_parts.push(format!("{} AS {}", subquery, quoted(inc.name)));
    }

    let where_parts = push_filters(&mut q, entity, filters, MAIN_ALIAS);
    let order = entity
        .pk_columns
        .iter()
        .map(|c| format!("{}.{}", MAIN_ALIAS, quoted(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT))).unwrap_or_default();
    let offset_clause = if offset > 0 { format!(" OFFSET {}", offset) } else { String::new() };

    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}{}{}",
        select_parts.join(", "),
        qualified_table(entity),
        MAIN_ALIAS,
        where_clause(&where_parts),
        order,
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT rows whose `column` equals $1, ordered by pk. Used for related-row lookups.
pub fn select_by_column(entity: &ResolvedEntity, column_name: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = entity.column(column_name).map(|c| c.pg_type.as_str()).unwrap_or("integer");
    let order = entity.pk_columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ");
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1::{} ORDER BY {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(column_name),
        cast,
        order
    );
    q
}

/// `SELECT EXISTS(...)` on one column value; with `exclude_pk`, $2 is a primary key to ignore (updates).
pub fn exists_by_column(entity: &ResolvedEntity, column_name: &str, exclude_pk: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = entity.column(column_name).map(|c| c.pg_type.as_str()).unwrap_or("text");
    let mut cond = format!("{} = $1::{}", quoted(column_name), cast);
    if exclude_pk {
        let pk_cast = pk_column(entity).map(|c| c.pg_type.as_str()).unwrap_or("integer");
        cond.push_str(&format!(" AND {} <> $2::{}", quoted(entity.pk()), pk_cast));
    }
    q.sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", qualified_table(entity), cond);
    q
}

/// `SELECT EXISTS(...)` for the row a foreign key value points at. Caller adds the value as $1.
pub fn exists_reference(reference: &ReferenceSpec) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1::integer)",
        reference.related_table,
        quoted(&reference.related_column)
    );
    q
}

/// INSERT: columns and placeholders from entity; values from body.
/// Serial keys are never written; columns with a DB default are omitted when the body lacks them.
pub fn insert(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if c.is_pk && entity.pk_serial {
            continue;
        }
        let val = body.get(&c.name).cloned();
        if val.is_none() && c.has_default {
            continue;
        }
        placeholders.push(q.push_param(c, val.unwrap_or(Value::Null)));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body (and in entity columns), never the key.
/// With nothing to set this degrades to a SELECT by id so callers still get the row (or none).
pub fn update(entity: &ResolvedEntity, id: &Value, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(entity);
    let pk = entity.pk();
    let mut sets = Vec::new();
    // Column order keeps the statement text stable regardless of map iteration.
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let ph = q.push_param(c, v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    let Some(pk_col) = pk_column(entity) else {
        return q;
    };
    let returning = select_column_list(entity);
    if sets.is_empty() {
        let ph = q.push_param(pk_col, id.clone());
        q.sql = format!("SELECT {} FROM {} WHERE {} = {}", returning, table, quoted(pk), ph);
        return q;
    }
    let id_ph = q.push_param(pk_col, id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        quoted(pk),
        id_ph,
        returning
    );
    q
}

/// DELETE by id. Caller adds id as sole param.
pub fn delete(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = pk_column(entity).map(|c| c.pg_type.as_str()).unwrap_or("integer");
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1::{} RETURNING {}",
        qualified_table(entity),
        quoted(entity.pk()),
        cast,
        select_column_list(entity)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_embedded, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&load_embedded().unwrap()).unwrap()
    }

    #[test]
    fn select_by_id_casts_key() {
        let m = model();
        let q = select_by_id(m.entity_by_path("items").unwrap());
        assert_eq!(
            q.sql,
            "SELECT \"item_id\", \"name\", \"is_key_item\", \"effect\" FROM \"public\".\"items\" WHERE \"item_id\" = $1::integer"
        );
    }

    #[test]
    fn list_applies_filters_limit_and_offset() {
        let m = model();
        let enemies = m.entity_by_path("enemies").unwrap();
        let filters = vec![
            Filter {
                column: "hp".into(),
                op: FilterOp::Gte,
                value: json!(10),
            },
            Filter {
                column: "hp".into(),
                op: FilterOp::Lte,
                value: json!(40),
            },
            Filter::eq("not_a_column", json!(1)),
        ];
        let q = select_list(enemies, &filters, Some(5000), 20, &[]);
        assert!(q.sql.contains("WHERE main.\"hp\" >= $1::integer AND main.\"hp\" <= $2::integer"));
        assert!(q.sql.ends_with("ORDER BY main.\"enemy_id\" LIMIT 1000 OFFSET 20"));
        assert_eq!(q.params, vec![json!(10), json!(40)]);
    }

    #[test]
    fn list_without_limit_returns_everything() {
        let m = model();
        let q = select_list(m.entity_by_path("chapters").unwrap(), &[], None, 0, &[]);
        assert!(!q.sql.contains("LIMIT"));
        assert!(!q.sql.contains("OFFSET"));
    }

    #[test]
    fn not_null_filter_binds_nothing() {
        let m = model();
        let blocks = m.entity_by_path("blocks").unwrap();
        let f = Filter {
            column: "contains_item_id".into(),
            op: FilterOp::NotNull,
            value: json!(false),
        };
        let q = select_list(blocks, &[f], None, 0, &[]);
        assert!(q.sql.contains("main.\"contains_item_id\" IS NULL"));
        assert!(q.params.is_empty());
        assert!(q.sql.contains("main.\"block_type\"::text AS \"block_type\""));
    }

    #[test]
    fn composite_key_lists_order_by_every_key_column() {
        let m = model();
        let q = select_list(m.entity_by_path("quest-characters").unwrap(), &[], None, 0, &[]);
        assert!(q.sql.ends_with("ORDER BY main.\"quest_id\", main.\"character_id\""));
    }

    #[test]
    fn includes_become_json_subqueries() {
        let m = model();
        let chapters = m.entity_by_path("chapters").unwrap();
        let locations = m.entity_by_path("locations").unwrap();
        let inc = IncludeSelect {
            name: "locations",
            direction: IncludeDirection::ToMany,
            related: locations,
            our_key: "chapter_id",
            their_key: "chapter_id",
        };
        let q = select_list(chapters, &[], None, 0, &[inc]);
        assert!(q.sql.contains("COALESCE(json_agg(row_to_json(sub)), '[]'::json)"));
        assert!(q.sql.contains("WHERE \"chapter_id\" = main.\"chapter_id\") sub) AS \"locations\""));
    }

    #[test]
    fn insert_skips_serial_key_and_defaults() {
        let m = model();
        let pixls = m.entity_by_path("pixls").unwrap();
        let body: HashMap<String, Value> = [("name".to_string(), json!("Thoreau"))].into_iter().collect();
        let q = insert(pixls, &body);
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"pixls\" (\"name\", \"unlock_chapter_id\", \"ability\") VALUES ($1::text, $2::integer, $3::text)"
        ));
        assert_eq!(q.params, vec![json!("Thoreau"), Value::Null, Value::Null]);
    }

    #[test]
    fn insert_casts_enum_values() {
        let m = model();
        let blocks = m.entity_by_path("blocks").unwrap();
        let body: HashMap<String, Value> = [
            ("location_id".to_string(), json!(1)),
            ("block_type".to_string(), json!("save")),
        ]
        .into_iter()
        .collect();
        let q = insert(blocks, &body);
        assert!(q.sql.contains("$3::\"public\".\"block_type\""));
    }

    #[test]
    fn update_sets_only_provided_columns() {
        let m = model();
        let enemies = m.entity_by_path("enemies").unwrap();
        let body: HashMap<String, Value> = [
            ("attack".to_string(), json!(3)),
            ("hp".to_string(), json!(12)),
            ("enemy_id".to_string(), json!(99)),
        ]
        .into_iter()
        .collect();
        let q = update(enemies, &json!(7), &body);
        assert!(q
            .sql
            .starts_with("UPDATE \"public\".\"enemies\" SET \"hp\" = $1::integer, \"attack\" = $2::integer WHERE \"enemy_id\" = $3::integer"));
        assert_eq!(q.params, vec![json!(12), json!(3), json!(7)]);
    }

    #[test]
    fn empty_update_reads_row() {
        let m = model();
        let q = update(m.entity_by_path("items").unwrap(), &json!(1), &HashMap::new());
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![json!(1)]);
    }

    #[test]
    fn exists_can_exclude_the_row_being_updated() {
        let m = model();
        let q = exists_by_column(m.entity_by_path("characters").unwrap(), "name", true);
        assert_eq!(
            q.sql,
            "SELECT EXISTS(SELECT 1 FROM \"public\".\"characters\" WHERE \"name\" = $1::text AND \"character_id\" <> $2::integer)"
        );
    }

    #[test]
    fn reference_check_targets_the_parent_key() {
        let m = model();
        let bosses = m.entity_by_path("bosses").unwrap();
        let chapter = bosses.references.iter().find(|r| r.column == "chapter_id").unwrap();
        assert_eq!(
            exists_reference(chapter).sql,
            "SELECT EXISTS(SELECT 1 FROM \"public\".\"chapters\" WHERE \"chapter_id\" = $1::integer)"
        );
    }

    #[test]
    fn delete_returns_removed_row() {
        let m = model();
        let q = delete(m.entity_by_path("switches").unwrap());
        assert!(q.sql.starts_with("DELETE FROM \"public\".\"switches\" WHERE \"switch_id\" = $1::integer RETURNING"));
    }
}
